//! The closed set of engine actions and their generation profiles.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// What a unified-engine request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    GenerateQuestions,
    Chat,
    GenerateDocument,
    AnalyzeFile,
    GenerateSimulation,
    ExtractQuestions,
    ExtractQuestionsDetailed,
}

/// How an action is sent to the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActionProfile {
    /// Used when the request carries no `systemPrompt`
    pub system_prompt: &'static str,
    /// Output is parsed into `data` when it is valid JSON
    pub json_output: bool,
    pub temperature: f32,
    pub max_tokens: u32,
}

const QUESTIONS_PROMPT: &str = "Você é um especialista em concursos bancários brasileiros \
(Banco do Brasil, Caixa, BNB, BASA, Banrisul) e elabora questões no estilo das bancas \
CESGRANRIO, FGV e CESPE. Gere questões inéditas de múltipla escolha com cinco alternativas \
(A a E) e exatamente uma correta. Responda SOMENTE com um array JSON, sem texto adicional, \
em que cada item tem os campos: \"question\", \"options\" (objeto com as chaves A, B, C, D, E), \
\"correct_answer\", \"explanation\", \"subject\" e \"difficulty\" (facil, medio ou dificil).";

const CHAT_PROMPT: &str = "Você é um tutor especializado em concursos bancários. Responda em \
português do Brasil, de forma clara e didática, citando a legislação e as normas do \
Sistema Financeiro Nacional quando forem relevantes.";

const DOCUMENT_PROMPT: &str = "Você é um professor de cursinho preparatório para concursos \
bancários. Produza material de estudo completo em Markdown, com títulos, listas, exemplos \
práticos e um resumo final com os pontos que mais caem em prova.";

const ANALYZE_PROMPT: &str = "Você analisa materiais de estudo para concursos bancários. \
Identifique os temas abordados, os conceitos-chave, lacunas de conteúdo e sugira como o \
candidato deve estudar o material. Responda em Markdown.";

const SIMULATION_PROMPT: &str = "Você monta simulados de concursos bancários fiéis ao edital \
e ao estilo da banca. Responda SOMENTE com um objeto JSON com os campos \"title\", \
\"description\", \"time_limit_minutes\" e \"questions\" (array de questões com \"question\", \
\"options\" de A a E, \"correct_answer\", \"explanation\", \"subject\" e \"difficulty\").";

const EXTRACT_PROMPT: &str = "Você extrai questões de provas de concursos a partir de texto \
bruto. Preserve o enunciado e as alternativas exatamente como aparecem. Responda SOMENTE com \
um array JSON em que cada item tem \"question\", \"options\" (objeto com as chaves das \
alternativas) e \"correct_answer\" (null quando o gabarito não constar do texto).";

const EXTRACT_DETAILED_PROMPT: &str = "Você extrai questões de provas de concursos a partir \
de texto bruto e as classifica. Preserve enunciados e alternativas exatamente como aparecem. \
Responda SOMENTE com um array JSON em que cada item tem \"question\", \"options\", \
\"correct_answer\" (ou null), \"explanation\", \"subject\", \"topic\", \"difficulty\" \
(facil, medio ou dificil) e \"exam_board\" quando identificável.";

impl Action {
    pub const ALL: [Action; 7] = [
        Action::GenerateQuestions,
        Action::Chat,
        Action::GenerateDocument,
        Action::AnalyzeFile,
        Action::GenerateSimulation,
        Action::ExtractQuestions,
        Action::ExtractQuestionsDetailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GenerateQuestions => "generate_questions",
            Action::Chat => "chat",
            Action::GenerateDocument => "generate_document",
            Action::AnalyzeFile => "analyze_file",
            Action::GenerateSimulation => "generate_simulation",
            Action::ExtractQuestions => "extract_questions",
            Action::ExtractQuestionsDetailed => "extract_questions_detailed",
        }
    }

    /// The single place where an action's behavior is decided.
    pub fn profile(&self) -> ActionProfile {
        match self {
            Action::GenerateQuestions => ActionProfile {
                system_prompt: QUESTIONS_PROMPT,
                json_output: true,
                temperature: 0.7,
                max_tokens: 4096,
            },
            Action::Chat => ActionProfile {
                system_prompt: CHAT_PROMPT,
                json_output: false,
                temperature: 0.7,
                max_tokens: 2048,
            },
            Action::GenerateDocument => ActionProfile {
                system_prompt: DOCUMENT_PROMPT,
                json_output: false,
                temperature: 0.6,
                max_tokens: 8192,
            },
            Action::AnalyzeFile => ActionProfile {
                system_prompt: ANALYZE_PROMPT,
                json_output: false,
                temperature: 0.4,
                max_tokens: 4096,
            },
            Action::GenerateSimulation => ActionProfile {
                system_prompt: SIMULATION_PROMPT,
                json_output: true,
                temperature: 0.7,
                max_tokens: 8192,
            },
            Action::ExtractQuestions => ActionProfile {
                system_prompt: EXTRACT_PROMPT,
                json_output: true,
                temperature: 0.2,
                max_tokens: 8192,
            },
            Action::ExtractQuestionsDetailed => ActionProfile {
                system_prompt: EXTRACT_DETAILED_PROMPT,
                json_output: true,
                temperature: 0.2,
                max_tokens: 16384,
            },
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown action '{s}'"))
    }
}

/// Actions accepted by the chat session layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    #[default]
    Chat,
    GenerateDocument,
    AnalyzeFile,
}

impl ChatAction {
    pub const ALL: [ChatAction; 3] = [
        ChatAction::GenerateDocument,
        ChatAction::AnalyzeFile,
        ChatAction::Chat,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChatAction::Chat => "chat",
            ChatAction::GenerateDocument => "generate_document",
            ChatAction::AnalyzeFile => "analyze_file",
        }
    }

    /// Task block appended after the persona.
    pub fn instruction(&self) -> &'static str {
        match self {
            ChatAction::Chat => {
                "TAREFA: converse com o candidato, tire dúvidas e proponha exercícios \
                 curtos quando fizer sentido."
            }
            ChatAction::GenerateDocument => {
                "TAREFA: gere um documento de estudo completo em Markdown sobre o tema \
                 pedido, com introdução, tópicos, exemplos, pegadinhas de prova e resumo final."
            }
            ChatAction::AnalyzeFile => {
                "TAREFA: analise os arquivos anexados à sessão. Aponte os temas cobertos, \
                 o que é mais cobrado em prova e um plano de estudo baseado no material."
            }
        }
    }

    pub fn max_tokens(&self) -> u32 {
        match self {
            ChatAction::Chat => 2048,
            ChatAction::GenerateDocument => 8192,
            ChatAction::AnalyzeFile => 4096,
        }
    }
}

impl FromStr for ChatAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChatAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown chat action '{s}'"))
    }
}

impl fmt::Display for ChatAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
        assert!("summarize".parse::<Action>().is_err());
        assert!("Chat".parse::<Action>().is_err());
    }

    #[test]
    fn json_actions() {
        let json: Vec<&str> = Action::ALL
            .into_iter()
            .filter(|a| a.profile().json_output)
            .map(|a| a.as_str())
            .collect();
        assert_eq!(
            json,
            vec![
                "generate_questions",
                "generate_simulation",
                "extract_questions",
                "extract_questions_detailed"
            ]
        );
    }

    #[test]
    fn extraction_runs_cold() {
        assert!(Action::ExtractQuestions.profile().temperature < Action::Chat.profile().temperature);
    }

    #[test]
    fn chat_actions() {
        assert_eq!("analyze_file".parse::<ChatAction>().unwrap(), ChatAction::AnalyzeFile);
        assert!("generate_questions".parse::<ChatAction>().is_err());
        assert_eq!(ChatAction::default(), ChatAction::Chat);
    }
}
