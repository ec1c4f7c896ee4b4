use serde::{Deserialize, Serialize};
use std::fmt;

/// Shading-language dialect a program is written in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderLanguage {
    /// Desktop GLSL
    #[default]
    #[serde(rename = "glsl")]
    Glsl,
    /// GLSL ES, predefines `GL_ES=1`
    #[serde(rename = "glsles")]
    GlslEs,
}

impl ShaderLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            ShaderLanguage::Glsl => "glsl",
            ShaderLanguage::GlslEs => "glsles",
        }
    }

    /// True for the embedded/mobile dialect.
    pub fn is_embedded(self) -> bool {
        matches!(self, ShaderLanguage::GlslEs)
    }
}

impl fmt::Display for ShaderLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    #[default]
    Vertex,
    Fragment,
    Compute,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
        };
        f.write_str(name)
    }
}

/// Load state of a program's high-level (preprocessed + compiled) form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    Unloaded,
    Loaded,
}
