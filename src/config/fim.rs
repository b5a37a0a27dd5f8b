//! Fill-in-the-middle prompt templates for code completions
//!
//! Each template is persisted by its kebab-case name in `ollama.toml`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Prompt layout used when asking a code model to fill a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FimTemplate {
    CodeLlama,
    CodeGemma,
    #[default]
    CodeQwen,
    DeepseekCoder,
    Starcoder,
    Stability,
    Codestral,
}

impl FimTemplate {
    pub const ALL: [FimTemplate; 7] = [
        FimTemplate::CodeLlama,
        FimTemplate::CodeGemma,
        FimTemplate::CodeQwen,
        FimTemplate::DeepseekCoder,
        FimTemplate::Starcoder,
        FimTemplate::Stability,
        FimTemplate::Codestral,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FimTemplate::CodeLlama => "code-llama",
            FimTemplate::CodeGemma => "code-gemma",
            FimTemplate::CodeQwen => "code-qwen",
            FimTemplate::DeepseekCoder => "deepseek-coder",
            FimTemplate::Starcoder => "starcoder",
            FimTemplate::Stability => "stability",
            FimTemplate::Codestral => "codestral",
        }
    }

    /// Human-readable label for pickers
    pub fn label(&self) -> &'static str {
        match self {
            FimTemplate::CodeLlama => "Code Llama",
            FimTemplate::CodeGemma => "CodeGemma",
            FimTemplate::CodeQwen => "Qwen 2.5 Coder",
            FimTemplate::DeepseekCoder => "DeepSeek Coder",
            FimTemplate::Starcoder => "StarCoder",
            FimTemplate::Stability => "Stable Code",
            FimTemplate::Codestral => "Codestral",
        }
    }

    /// Build the completion prompt for the text around the cursor
    pub fn build_prompt(&self, prefix: &str, suffix: &str) -> String {
        match self {
            FimTemplate::CodeLlama => format!("<PRE> {prefix} <SUF>{suffix} <MID>"),
            FimTemplate::CodeGemma => {
                format!("<|fim_prefix|>{prefix}<|fim_suffix|>{suffix}<|fim_middle|>")
            }
            FimTemplate::CodeQwen => {
                format!("<|fim_prefix|>{prefix}<|fim_suffix|>{suffix}<|fim_middle|>")
            }
            FimTemplate::DeepseekCoder => {
                format!("<｜fim▁begin｜>{prefix}<｜fim▁hole｜>{suffix}<｜fim▁end｜>")
            }
            FimTemplate::Starcoder | FimTemplate::Stability => {
                format!("<fim_prefix>{prefix}<fim_suffix>{suffix}<fim_middle>")
            }
            FimTemplate::Codestral => format!("[SUFFIX]{suffix}[PREFIX]{prefix}"),
        }
    }

    /// Tokens that end a completion for this template
    pub fn stop_tokens(&self) -> &'static [&'static str] {
        match self {
            FimTemplate::CodeLlama => &["<EOT>"],
            FimTemplate::CodeGemma => &["<|file_separator|>", "<|fim_prefix|>"],
            FimTemplate::CodeQwen => &["<|endoftext|>", "<|fim_pad|>", "<|repo_name|>"],
            FimTemplate::DeepseekCoder => &["<｜end▁of▁sentence｜>"],
            FimTemplate::Starcoder | FimTemplate::Stability => &["<|endoftext|>", "<file_sep>"],
            FimTemplate::Codestral => &["</s>"],
        }
    }
}

impl fmt::Display for FimTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FimTemplate {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FimTemplate::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| SettingsError::Config(format!("Unknown FIM template: {}", s)))
    }
}
