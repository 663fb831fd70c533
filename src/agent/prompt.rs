//! Tone, focus mode and system prompt composition.

use crate::config::Prompts;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Writing style requested for the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Neutral,
    Professional,
    Creative,
    Academic,
    Simplified,
    Concise,
}

impl Tone {
    pub fn instruction(&self) -> &'static str {
        match self {
            Tone::Neutral => "Maintain a neutral, balanced, and objective tone.",
            Tone::Professional => {
                "Use a formal, professional tone suitable for business contexts. Be precise and concise."
            }
            Tone::Creative => {
                "Use a creative, engaging, and slightly informal tone. Use analogies and vivid language where appropriate."
            }
            Tone::Academic => {
                "Use an academic, scholarly tone. Focus on depth, accuracy, and citations. Use technical terminology correctly."
            }
            Tone::Simplified => {
                "Explain concepts simply, as if to a beginner or a 5-year-old. Avoid jargon or explain it clearly."
            }
            Tone::Concise => "Be extremely concise. Get straight to the point. Use bullet points.",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Neutral => "Neutral",
            Tone::Professional => "Professional",
            Tone::Creative => "Creative",
            Tone::Academic => "Academic",
            Tone::Simplified => "Simplified",
            Tone::Concise => "Concise",
        }
    }
}

impl FromStr for Tone {
    type Err = std::convert::Infallible;

    /// Case-insensitive; unknown names fall back to [`Tone::Neutral`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "professional" => Tone::Professional,
            "creative" => Tone::Creative,
            "academic" => Tone::Academic,
            "simplified" => Tone::Simplified,
            "concise" => Tone::Concise,
            _ => Tone::Neutral,
        })
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of sources the agent should favour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FocusMode {
    #[default]
    Web,
    Academic,
    Writing,
    Youtube,
    Reddit,
}

/// Tools available in every focus mode.
const COMMON_TOOLS: &[&str] = &["calculator", "weather"];

impl FocusMode {
    pub fn instruction(&self) -> &'static str {
        match self {
            FocusMode::Web => "Search the entire web for the most relevant and up-to-date information.",
            FocusMode::Academic => {
                "Focus on academic papers, journals, and scholarly articles. Prioritize 'academic_search'."
            }
            FocusMode::Writing => {
                "Focus on writing, drafting, and creative composition. Do NOT perform web searches unless explicitly asked for facts."
            }
            FocusMode::Youtube => "Focus on finding relevant videos on YouTube. Prioritize 'youtube_search'.",
            FocusMode::Reddit => {
                "Focus on discussions and opinions from Reddit. Prioritize 'reddit_search'."
            }
        }
    }

    /// Names of the tools this mode exposes, besides the common and dynamic ones.
    pub fn tool_names(&self) -> Vec<&'static str> {
        let specific: &[&str] = match self {
            FocusMode::Web => &[
                "tavily_search_results_json",
                "serper_search",
                "news_search",
                "web_scraper",
                "vector_search",
                "wikipedia",
                "academic_search",
                "youtube_search",
                "reddit_search",
            ],
            FocusMode::Academic => &["academic_search", "wikipedia", "web_scraper", "vector_search"],
            FocusMode::Writing => &["vector_search"],
            FocusMode::Youtube => &["youtube_search"],
            FocusMode::Reddit => &["reddit_search", "web_scraper"],
        };
        specific.iter().chain(COMMON_TOOLS).copied().collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FocusMode::Web => "web",
            FocusMode::Academic => "academic",
            FocusMode::Writing => "writing",
            FocusMode::Youtube => "youtube",
            FocusMode::Reddit => "reddit",
        }
    }
}

impl FromStr for FocusMode {
    type Err = std::convert::Infallible;

    /// Case-insensitive; unknown names fall back to [`FocusMode::Web`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "academic" => FocusMode::Academic,
            "writing" => FocusMode::Writing,
            "youtube" => FocusMode::Youtube,
            "reddit" => FocusMode::Reddit,
            _ => FocusMode::Web,
        })
    }
}

impl fmt::Display for FocusMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Render the agent system prompt for one request.
pub fn build_system_prompt(prompts: &Prompts, tone: Tone, focus: FocusMode, research: bool) -> String {
    let template = if research {
        &prompts.agent.research_system
    } else {
        &prompts.agent.system
    };

    let mut vars = HashMap::new();
    vars.insert(
        "date".to_string(),
        chrono::Local::now().format("%A, %B %-d, %Y").to_string(),
    );
    vars.insert("tone_instruction".to_string(), tone.instruction().to_string());
    vars.insert("focus_mode".to_string(), focus.as_str().to_string());
    vars.insert("focus_instruction".to_string(), focus.instruction().to_string());

    prompts.render_with_custom(template, &vars)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenient_parsing() {
        assert_eq!("creative".parse::<Tone>().unwrap(), Tone::Creative);
        assert_eq!("CONCISE".parse::<Tone>().unwrap(), Tone::Concise);
        assert_eq!("shouty".parse::<Tone>().unwrap(), Tone::Neutral);

        assert_eq!("Reddit".parse::<FocusMode>().unwrap(), FocusMode::Reddit);
        assert_eq!("".parse::<FocusMode>().unwrap(), FocusMode::Web);
    }

    #[test]
    fn test_focus_tools_include_common() {
        let tools = FocusMode::Youtube.tool_names();
        assert!(tools.contains(&"youtube_search"));
        assert!(tools.contains(&"calculator"));
        assert!(tools.contains(&"weather"));
        assert!(!tools.contains(&"web_scraper"));
    }

    #[test]
    fn test_build_system_prompt() {
        let prompts = Prompts::default();

        let prompt = build_system_prompt(&prompts, Tone::Concise, FocusMode::Academic, false);
        assert!(prompt.contains(Tone::Concise.instruction()));
        assert!(prompt.contains("FOCUS MODE: academic"));
        assert!(!prompt.contains("{{"));

        let research = build_system_prompt(&prompts, Tone::Neutral, FocusMode::Web, true);
        assert!(research.contains("Research Assistant"));
        assert!(!research.contains("{{date}}"));
    }
}
