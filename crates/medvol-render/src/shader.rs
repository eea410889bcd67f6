//! Shader assembly and reflection.
//!
//! Assembled WGSL is parsed once with naga; the resulting module tells the
//! ray-marching stage which 3D textures to bind and whether the step length
//! is worth uploading.

use std::collections::HashSet;

use crate::error::{RenderError, RenderResult};

/// Builder concatenating WGSL chunks into one shader module.
pub struct ShaderBuilder {
    chunks: Vec<String>,
    vertex_source: Option<String>,
    fragment_source: Option<String>,
    label: Option<String>,
}

impl ShaderBuilder {
    /// Creates a new shader builder.
    #[must_use]
    pub fn new() -> Self {
        Self {
            chunks: Vec::new(),
            vertex_source: None,
            fragment_source: None,
            label: None,
        }
    }

    /// Prepends declarations shared by both stages.
    #[must_use]
    pub fn with_chunk(mut self, source: impl Into<String>) -> Self {
        self.chunks.push(source.into());
        self
    }

    /// Sets the vertex shader source (WGSL).
    #[must_use]
    pub fn with_vertex(mut self, source: impl Into<String>) -> Self {
        self.vertex_source = Some(source.into());
        self
    }

    /// Sets the fragment shader source (WGSL).
    #[must_use]
    pub fn with_fragment(mut self, source: impl Into<String>) -> Self {
        self.fragment_source = Some(source.into());
        self
    }

    /// Sets the shader label for debugging.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Builds the shader module and reflects on the assembled source.
    pub fn build_module(
        self,
        device: &wgpu::Device,
    ) -> RenderResult<(wgpu::ShaderModule, ShaderCapabilities)> {
        let source = self.combined_source()?;
        let capabilities = ShaderCapabilities::reflect(&source)?;

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: self.label.as_deref(),
            source: wgpu::ShaderSource::Wgsl(source.into()),
        });

        Ok((module, capabilities))
    }

    /// Joins all chunks, the vertex and the fragment source.
    pub fn combined_source(&self) -> RenderResult<String> {
        let vertex = self
            .vertex_source
            .as_ref()
            .ok_or_else(|| RenderError::ShaderCompilationFailed("missing vertex shader".into()))?;

        let fragment = self.fragment_source.as_ref().ok_or_else(|| {
            RenderError::ShaderCompilationFailed("missing fragment shader".into())
        })?;

        let mut parts: Vec<&str> = self.chunks.iter().map(String::as_str).collect();
        parts.push(vertex);
        // If sources are the same file, include it once
        if vertex != fragment {
            parts.push(fragment);
        }
        Ok(parts.join("\n\n"))
    }
}

impl Default for ShaderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A `texture_3d` binding declared by a shader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBinding {
    pub group: u32,
    pub binding: u32,
    pub name: String,
}

/// What a shader consumes, determined once when it is assembled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShaderCapabilities {
    /// The fragment stage reads a `step_length` uniform member.
    pub uses_step_length: bool,
    /// Declared 3D texture bindings in source order.
    pub volume_bindings: Vec<VolumeBinding>,
}

impl ShaderCapabilities {
    /// Parses WGSL source and collects the inputs the ray-marching stage can
    /// provide.
    pub fn reflect(source: &str) -> RenderResult<Self> {
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|e| RenderError::ShaderCompilationFailed(e.emit_to_string(source)))?;
        Ok(Self::from_module(&module))
    }

    /// Collects capabilities from an already parsed module.
    pub fn from_module(module: &naga::Module) -> Self {
        let volume_bindings = module
            .global_variables
            .iter()
            .filter_map(|(_, global)| {
                let naga::TypeInner::Image {
                    dim: naga::ImageDimension::D3,
                    ..
                } = module.types[global.ty].inner
                else {
                    return None;
                };
                let binding = global.binding.as_ref()?;
                Some(VolumeBinding {
                    group: binding.group,
                    binding: binding.binding,
                    name: global.name.clone().unwrap_or_default(),
                })
            })
            .collect();

        let uses_step_length = module
            .entry_points
            .iter()
            .find(|entry| entry.stage == naga::ShaderStage::Fragment && entry.name == "fs_main")
            .is_some_and(|entry| reads_member(module, &entry.function, "step_length"));

        Self {
            uses_step_length,
            volume_bindings,
        }
    }

    /// Binding slot of the 3D texture named `name`.
    pub fn volume_binding(&self, name: &str) -> Option<&VolumeBinding> {
        self.volume_bindings.iter().find(|b| b.name == name)
    }
}

/// Whether `entry` or any function it calls reads the struct member
/// `member` of a global variable.
fn reads_member(module: &naga::Module, entry: &naga::Function, member: &str) -> bool {
    let mut visited = HashSet::new();
    let mut pending = vec![entry];
    while let Some(function) = pending.pop() {
        if accesses_global_member(module, function, member) {
            return true;
        }
        let mut callees = Vec::new();
        collect_calls(&function.body, &mut callees);
        for callee in callees {
            if visited.insert(callee) {
                pending.push(&module.functions[callee]);
            }
        }
    }
    false
}

fn accesses_global_member(module: &naga::Module, function: &naga::Function, member: &str) -> bool {
    function.expressions.iter().any(|(_, expression)| {
        let naga::Expression::AccessIndex { base, index } = *expression else {
            return false;
        };
        let mut base = &function.expressions[base];
        if let naga::Expression::Load { pointer } = *base {
            base = &function.expressions[pointer];
        }
        let naga::Expression::GlobalVariable(global) = *base else {
            return false;
        };
        match &module.types[module.global_variables[global].ty].inner {
            naga::TypeInner::Struct { members, .. } => members
                .get(index as usize)
                .and_then(|m| m.name.as_deref())
                .is_some_and(|name| name == member),
            _ => false,
        }
    })
}

fn collect_calls(block: &naga::Block, out: &mut Vec<naga::Handle<naga::Function>>) {
    for statement in block.iter() {
        match statement {
            naga::Statement::Call { function, .. } => out.push(*function),
            naga::Statement::Block(inner) => collect_calls(inner, out),
            naga::Statement::If { accept, reject, .. } => {
                collect_calls(accept, out);
                collect_calls(reject, out);
            }
            naga::Statement::Switch { cases, .. } => {
                for case in cases {
                    collect_calls(&case.body, out);
                }
            }
            naga::Statement::Loop { body, continuing, .. } => {
                collect_calls(body, out);
                collect_calls(continuing, out);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "
struct SegmentUniforms {
    model_view_projection: mat4x4<f32>,
    step_length: f32,
}
@group(0) @binding(0) var<uniform> segment: SegmentUniforms;
@group(1) @binding(2) var intensities: texture_3d<f32>;
@group(1) @binding(3) var normals : texture_3d<f32>;
@group(2) @binding(1) var color_map: texture_1d<f32>;
// @group(1) @binding(4) var ignored: texture_3d<f32>;

fn sample_distance() -> f32 {
    return segment.step_length;
}

@fragment
fn fs_main() -> @location(0) vec4<f32> {
    return vec4<f32>(sample_distance());
}
";

    #[test]
    fn test_reflect_bindings() {
        let caps = ShaderCapabilities::reflect(SOURCE).unwrap();
        assert!(caps.uses_step_length);
        assert_eq!(caps.volume_bindings.len(), 2);
        assert_eq!(caps.volume_binding("normals").map(|b| b.binding), Some(3));
        assert_eq!(caps.volume_binding("intensities").map(|b| b.group), Some(1));
        assert!(caps.volume_binding("ignored").is_none());
        assert!(caps.volume_binding("color_map").is_none());
    }

    #[test]
    fn test_reflect_binding_split_across_lines() {
        let caps = ShaderCapabilities::reflect("@group(1) @binding(0)\nvar intensities: texture_3d<f32>;").unwrap();
        assert_eq!(
            caps.volume_bindings,
            vec![VolumeBinding {
                group: 1,
                binding: 0,
                name: "intensities".into(),
            }]
        );
    }

    #[test]
    fn test_reflect_without_step_length() {
        let caps = ShaderCapabilities::reflect("// segment.step_length unused\nfn f() {}").unwrap();
        assert!(!caps.uses_step_length);
        assert!(caps.volume_bindings.is_empty());

        let caps = ShaderCapabilities::reflect("/* reads segment.step_length later */\nfn f() {}").unwrap();
        assert!(!caps.uses_step_length);
    }

    #[test]
    fn test_step_length_outside_fragment_entry_is_ignored() {
        let source = "
struct SegmentUniforms { step_length: f32 }
@group(0) @binding(0) var<uniform> segment: SegmentUniforms;
fn unused() -> f32 { return segment.step_length; }
@fragment
fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }
";
        let caps = ShaderCapabilities::reflect(source).unwrap();
        assert!(!caps.uses_step_length);
    }

    #[test]
    fn test_reflect_rejects_invalid_source() {
        let result = ShaderCapabilities::reflect("fn broken( {");
        assert!(matches!(result, Err(RenderError::ShaderCompilationFailed(_))));
    }

    #[test]
    fn test_combined_source_requires_both_stages() {
        let builder = ShaderBuilder::new().with_vertex("fn vs_main() {}");
        assert!(builder.combined_source().is_err());
    }

    #[test]
    fn test_combined_source_order() {
        let source = ShaderBuilder::new()
            .with_chunk("A")
            .with_vertex("B")
            .with_fragment("C")
            .combined_source()
            .unwrap();
        assert_eq!(source, "A\n\nB\n\nC");
    }
}
