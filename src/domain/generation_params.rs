use serde::Deserialize;

/// Sampling configuration, fixed for the lifetime of one generation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationParams {
    pub max_tokens: usize,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            top_p: 0.95,
            top_k: 50,
            stop_sequences: Vec::new(),
        }
    }
}
