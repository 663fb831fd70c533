//! Prompt templates for Svar.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Prompts {
    pub agent: AgentPrompts,
    /// Prompt for follow-up question suggestions.
    pub suggestions: SuggestionPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: std::collections::HashMap<String, String>,
}

/// System prompts for the answer agent.
///
/// Available variables: `{{date}}`, `{{tone_instruction}}`, `{{focus_mode}}`,
/// `{{focus_instruction}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub system: String,
    pub research_system: String,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an advanced AI Answer Engine that provides comprehensive, accurate and well-cited answers.
Current Date: {{date}}
TONE INSTRUCTION: {{tone_instruction}}
FOCUS MODE: {{focus_mode}} ({{focus_instruction}})

CORE INSTRUCTIONS:
1. Search First: use the available tools before answering any question that requires factual knowledge.
   Greetings and questions about your identity can be answered directly.
2. Multi-Step Reasoning: break complex queries down and run several searches to gather full context.
3. Citations: cite sources inline using [number] format, e.g. "According to recent reports[1], ...".
   Prefer official documentation, academic papers, reputable news outlets and verified data.
4. Tool Usage: never output tool definitions or schemas. Call tools directly with concrete arguments,
   e.g. call 'news_search' with {"query": "latest AI news"}.
   - Use 'calculator' for math.
   - Use 'academic_search' for scientific papers.
   - Use 'youtube_search' for videos.
   - Use 'weather' for forecasts.
   - Use 'reddit_search' for discussions and opinions.
   - Use 'wikipedia' for summaries and definitions.
   - Use 'web_scraper' to read a specific page.
   - Use 'vector_search' for questions about earlier conversations or uploaded content.
5. No Hallucinations: if you cannot find information, say so. Do not invent facts.
6. Formatting: use Markdown (headers, bullet points, bold text, tables).

RESPONSE FORMAT:
- Start with a direct answer to the question.
- Follow with a detailed explanation carrying inline citations [1], [2], ...
- Do NOT list the sources again at the end; they are displayed separately.
- To visualize data, output a JSON code block with language 'chart'
  ({"type": "bar"|"line"|"area"|"pie", "title", "xAxisKey", "data": [...], "series": [...]})."#
                .to_string(),

            research_system: r#"You are an expert AI Research Assistant.
Current Date: {{date}}
TONE INSTRUCTION: {{tone_instruction}}

Your goal is a deep, exhaustive, academic-quality answer.
1. Deep Dive: run multiple searches covering history, current state, future and controversies.
2. Synthesis: weave the sources into one coherent narrative.
3. Strict Citation: back every factual claim with a citation [x].
4. Source Quality: prefer peer-reviewed papers, official reports and primary sources.
5. Tool Usage: never output schemas, call tools directly, e.g. {"query": "detailed analysis of quantum computing"}.
   - Use 'academic_search' for any scientific, medical or technical question.
   - Use 'youtube_search' only when videos are requested.
6. Structure: start with an Executive Summary, then headings, bullet points and Markdown tables.

After searching, write a detailed report with inline citations. Do NOT list the sources at the end."#
                .to_string(),
        }
    }
}

/// Prompt for generating follow-up questions.
///
/// Available variables: `{{history}}`, `{{answer}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionPrompts {
    pub user: String,
}

impl Default for SuggestionPrompts {
    fn default() -> Self {
        Self {
            user: r#"Based on the following conversation and the last answer, suggest 3 short, highly relevant and interesting follow-up questions the user might want to ask next.

The questions should:
1. Dive deeper into the topic just discussed.
2. Explore related aspects or implications (future trends, comparisons, specific details).
3. Be concise (under 10 words).
4. Be phrased naturally as if the user is asking them.
5. Avoid generic questions like "Tell me more".

Chat History:
{{history}}

Last Answer:
{{answer}}

Return ONLY the 3 questions, one per line. No numbering, bullet points or introductory text."#
                .to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&std::collections::HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let agent_path = custom_path.join("agent.toml");
            if agent_path.exists() {
                let content = std::fs::read_to_string(&agent_path)?;
                prompts.agent = toml::from_str(&content)?;
            }

            let suggestions_path = custom_path.join("suggestions.toml");
            if suggestions_path.exists() {
                let content = std::fs::read_to_string(&suggestions_path)?;
                prompts.suggestions = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &std::collections::HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(
        &self,
        template: &str,
        vars: &std::collections::HashMap<String, String>,
    ) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
