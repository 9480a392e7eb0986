//! Typed shader modules and the chunk composer.
//!
//! A [`ShaderModule`] is a named WGSL body plus the stages it defines and the
//! chunks it includes. [`ShaderComposer`] resolves includes depth-first,
//! emitting every chunk exactly once and before anything that depends on it.

use std::borrow::Cow;
use std::collections::HashMap;

use thiserror::Error;
use tracing::debug;
use wgpu::{ShaderModuleDescriptor, ShaderSource};

/// Error types for shader composition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShaderError {
    #[error("shader '{module}' includes unknown chunk '{chunk}'")]
    UnknownChunk { module: String, chunk: String },

    #[error("shader '{module}' has a cyclic include: {}", .cycle.join(" -> "))]
    CyclicInclude { module: String, cycle: Vec<String> },

    #[error("shader '{module}' declares {stage:?} entry point '{entry_point}' but does not define it")]
    MissingEntryPoint {
        module: String,
        stage: StageKind,
        entry_point: String,
    },

    #[error("shader '{module}' declares no stages")]
    NoStages { module: String },
}

/// Pipeline stage a shader entry point serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

/// A named entry point for one pipeline stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderStage {
    pub kind: StageKind,
    pub entry_point: Cow<'static, str>,
}

impl ShaderStage {
    pub fn vertex(entry_point: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: StageKind::Vertex,
            entry_point: entry_point.into(),
        }
    }

    pub fn fragment(entry_point: impl Into<Cow<'static, str>>) -> Self {
        Self {
            kind: StageKind::Fragment,
            entry_point: entry_point.into(),
        }
    }
}

/// A reusable WGSL fragment with its own include dependencies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderChunk {
    pub name: Cow<'static, str>,
    pub source: Cow<'static, str>,
    pub requires: Vec<Cow<'static, str>>,
}

impl ShaderChunk {
    pub fn new(name: impl Into<Cow<'static, str>>, source: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            requires: Vec::new(),
        }
    }

    /// Add a chunk that must be emitted before this one.
    pub fn requires(mut self, chunk: impl Into<Cow<'static, str>>) -> Self {
        self.requires.push(chunk.into());
        self
    }
}

/// A shader program: stages, included chunks, and the module's own body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderModule {
    pub name: Cow<'static, str>,
    pub stages: Vec<ShaderStage>,
    pub includes: Vec<Cow<'static, str>>,
    pub body: Cow<'static, str>,
}

impl ShaderModule {
    pub fn new(name: impl Into<Cow<'static, str>>, body: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            includes: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_stage(mut self, stage: ShaderStage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn include(mut self, chunk: impl Into<Cow<'static, str>>) -> Self {
        self.includes.push(chunk.into());
        self
    }
}

/// Output of [`ShaderComposer::compose`]: a single WGSL source ready for wgpu.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposedShader {
    pub name: String,
    pub source: String,
    /// Chunks in the order they were emitted.
    pub chunks: Vec<String>,
    pub stages: Vec<ShaderStage>,
}

impl ComposedShader {
    /// Entry point for `kind`, if the module declares one.
    pub fn entry_point(&self, kind: StageKind) -> Option<&str> {
        self.stages
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| &*s.entry_point)
    }

    /// Descriptor for `wgpu::Device::create_shader_module`.
    pub fn descriptor(&self) -> ShaderModuleDescriptor<'_> {
        ShaderModuleDescriptor {
            label: Some(&self.name),
            source: ShaderSource::Wgsl(Cow::Borrowed(&self.source)),
        }
    }

    /// Compile on `device`.
    pub fn create_module(&self, device: &wgpu::Device) -> wgpu::ShaderModule {
        device.create_shader_module(self.descriptor())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Registry of chunks that modules may include.
#[derive(Debug, Default)]
pub struct ShaderComposer {
    chunks: HashMap<String, ShaderChunk>,
}

impl ShaderComposer {
    /// Create an empty composer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Composer preloaded with the `camera`, `lighting` and `fade` chunks.
    pub fn with_builtin_chunks() -> Self {
        let mut composer = Self::new();
        composer.register(ShaderChunk::new("camera", include_str!("shaders/camera.wgsl")));
        composer.register(ShaderChunk::new("lighting", include_str!("shaders/lighting.wgsl")));
        composer.register(ShaderChunk::new("fade", include_str!("shaders/fade.wgsl")));
        composer
    }

    /// Register a chunk, returning the one it replaced.
    pub fn register(&mut self, chunk: ShaderChunk) -> Option<ShaderChunk> {
        self.chunks.insert(chunk.name.to_string(), chunk)
    }

    /// Whether a chunk named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.chunks.contains_key(name)
    }

    /// Assemble `module` and its transitive includes into one WGSL source.
    pub fn compose(&self, module: &ShaderModule) -> Result<ComposedShader, ShaderError> {
        if module.stages.is_empty() {
            return Err(ShaderError::NoStages {
                module: module.name.to_string(),
            });
        }

        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        let mut order = Vec::new();
        for include in &module.includes {
            self.visit(&module.name, include, &mut marks, &mut stack, &mut order)?;
        }

        let mut source = String::new();
        for chunk in &order {
            source.push_str(&format!("// chunk: {}\n", chunk.name));
            source.push_str(&chunk.source);
            if !chunk.source.ends_with('\n') {
                source.push('\n');
            }
            source.push('\n');
        }
        source.push_str(&format!("// module: {}\n", module.name));
        source.push_str(&module.body);

        for stage in &module.stages {
            if !module.body.contains(&format!("fn {}(", stage.entry_point)) {
                return Err(ShaderError::MissingEntryPoint {
                    module: module.name.to_string(),
                    stage: stage.kind,
                    entry_point: stage.entry_point.to_string(),
                });
            }
        }

        let chunks: Vec<String> = order.iter().map(|c| c.name.to_string()).collect();
        debug!(module = %module.name, ?chunks, "composed shader");

        Ok(ComposedShader {
            name: module.name.to_string(),
            source,
            chunks,
            stages: module.stages.clone(),
        })
    }

    fn visit<'a>(
        &'a self,
        module: &str,
        name: &str,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<String>,
        order: &mut Vec<&'a ShaderChunk>,
    ) -> Result<(), ShaderError> {
        let chunk = self
            .chunks
            .get(name)
            .ok_or_else(|| ShaderError::UnknownChunk {
                module: module.to_string(),
                chunk: name.to_string(),
            })?;

        match marks.get(&*chunk.name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|n| n == name).unwrap_or(0);
                let mut cycle = stack[start..].to_vec();
                cycle.push(name.to_string());
                return Err(ShaderError::CyclicInclude {
                    module: module.to_string(),
                    cycle,
                });
            }
            None => {}
        }

        marks.insert(&*chunk.name, Mark::Visiting);
        stack.push(name.to_string());
        for dep in &chunk.requires {
            self.visit(module, dep, marks, stack, order)?;
        }
        stack.pop();
        marks.insert(&*chunk.name, Mark::Done);
        order.push(chunk);
        Ok(())
    }
}

/// The tile terrain program: lit, vertex-colored geometry.
pub fn tile_module() -> ShaderModule {
    ShaderModule::new("tile", include_str!("shaders/tile.wgsl"))
        .with_stage(ShaderStage::vertex("vs_main"))
        .with_stage(ShaderStage::fragment("fs_main"))
        .include("camera")
        .include("lighting")
}

/// The marker fill program: flat color with distance fade.
pub fn marker_fill_module() -> ShaderModule {
    ShaderModule::new("marker_fill", include_str!("shaders/marker_fill.wgsl"))
        .with_stage(ShaderStage::vertex("vs_main"))
        .with_stage(ShaderStage::fragment("fs_main"))
        .include("camera")
        .include("fade")
}
