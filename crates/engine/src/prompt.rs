//! Chat system-prompt assembly.
//!
//! The system message is built from layers, in order:
//!
//! 1. **Persona**: the fixed tutor identity and rules
//! 2. **Task**: the instruction of the requested [`ChatAction`]
//! 3. **Knowledge base**: every active document, rendered as
//!    summary / key concepts / topics / content sections
//! 4. **Session files**: extracted text of files attached to the session
//! 5. **Context**: free-form JSON supplied with the request
//!
//! Empty layers are omitted. Assembly is deterministic: the same inputs
//! always produce the same prompt.

use crate::action::ChatAction;
use crate::hash::{char_len, clip};
use regex::Regex;
use serde_json::Value;
use simulai_core::{KnowledgeDocument, UploadedFile};
use std::sync::LazyLock;

const PERSONA: &str = "Você é o SimulAI, tutor virtual especializado em concursos bancários \
brasileiros (Banco do Brasil, Caixa Econômica Federal, BNB, BASA, Banrisul e bancos \
estaduais). Você domina Conhecimentos Bancários, Matemática Financeira, Vendas e Negociação, \
Informática, Português e Atualidades do Sistema Financeiro Nacional.

REGRAS:
- Responda sempre em português do Brasil, com linguagem clara e didática.
- Baseie-se primeiro na BASE DE CONHECIMENTO e nos ARQUIVOS DA SESSÃO, quando existirem.
- Cite normas (resoluções do CMN, circulares do Bacen, leis) apenas quando tiver certeza.
- Use exemplos no estilo das bancas CESGRANRIO, FGV e CESPE.
- Se não souber algo, diga isso e indique como o candidato pode estudar o tema.";

static HEADING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?m)^#{1,3}[ \t]*(.+?)[ \t]*#*[ \t]*$").ok());

/// The four sections of a knowledge document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KnowledgeSections {
    pub summary: Option<String>,
    pub key_concepts: Option<String>,
    pub topics: Option<String>,
    pub full_content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionKind {
    Summary,
    KeyConcepts,
    Topics,
    Content,
}

fn classify_heading(title: &str) -> Option<SectionKind> {
    let title = title.to_lowercase();
    if title.contains("resumo") || title.contains("summary") {
        Some(SectionKind::Summary)
    } else if title.contains("conceito") || title.contains("concept") {
        Some(SectionKind::KeyConcepts)
    } else if title.contains("tópico") || title.contains("topico") || title.contains("topic") {
        Some(SectionKind::Topics)
    } else if title.contains("conteúdo") || title.contains("conteudo") || title.contains("content")
    {
        Some(SectionKind::Content)
    } else {
        None
    }
}

/// Split stored markdown into sections by heading.
///
/// Text under unrecognized headings stays with the section before it.
/// A document with no recognized heading is all full content.
pub fn extract_sections(content: &str) -> KnowledgeSections {
    let mut sections = KnowledgeSections::default();

    let headings: Vec<(usize, usize, Option<SectionKind>)> = HEADING
        .as_ref()
        .map(|re| {
            re.captures_iter(content)
                .filter_map(|caps| {
                    let whole = caps.get(0)?;
                    let title = caps.get(1)?;
                    Some((whole.start(), whole.end(), classify_heading(title.as_str())))
                })
                .collect()
        })
        .unwrap_or_default();

    let recognized: Vec<(usize, usize, SectionKind)> = headings
        .iter()
        .filter_map(|(start, end, kind)| kind.map(|k| (*start, *end, k)))
        .collect();

    if recognized.is_empty() {
        let text = content.trim();
        if !text.is_empty() {
            sections.full_content = Some(text.to_string());
        }
        return sections;
    }

    for (i, (_, body_start, kind)) in recognized.iter().enumerate() {
        let body_end = recognized
            .get(i + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(content.len());
        let body = content[*body_start..body_end].trim();
        if body.is_empty() {
            continue;
        }
        let slot = match kind {
            SectionKind::Summary => &mut sections.summary,
            SectionKind::KeyConcepts => &mut sections.key_concepts,
            SectionKind::Topics => &mut sections.topics,
            SectionKind::Content => &mut sections.full_content,
        };
        match slot {
            Some(existing) => {
                existing.push_str("\n\n");
                existing.push_str(body);
            }
            None => *slot = Some(body.to_string()),
        }
    }

    sections
}

fn render_knowledge(documents: &[KnowledgeDocument], content_cap: usize) -> String {
    if documents.is_empty() {
        return String::new();
    }

    let mut out = String::from("=== BASE DE CONHECIMENTO ===\n");
    for doc in documents {
        let sections = extract_sections(&doc.content);
        out.push_str(&format!("\n## {}", doc.title));
        if let Some(category) = &doc.category {
            out.push_str(&format!(" [{category}]"));
        }
        out.push('\n');

        for (label, text) in [
            ("Resumo", &sections.summary),
            ("Conceitos-chave", &sections.key_concepts),
            ("Tópicos", &sections.topics),
        ] {
            if let Some(text) = text {
                out.push_str(&format!("\n### {label}\n{text}\n"));
            }
        }
        if let Some(full) = &sections.full_content {
            out.push_str(&format!("\n### Conteúdo\n{}", clip(full, content_cap)));
            if char_len(full) > content_cap {
                out.push_str("\n[... conteúdo truncado ...]");
            }
            out.push('\n');
        }
    }
    out
}

fn render_files(files: &[UploadedFile], text_cap: usize) -> String {
    if files.is_empty() {
        return String::new();
    }

    let mut out = String::from("=== ARQUIVOS DA SESSÃO ===\n");
    for file in files {
        out.push_str(&format!("\n--- {} ({}) ---\n", file.file_name, file.file_type));
        match file.extracted_text.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                out.push_str(clip(text, text_cap));
                if char_len(text) > text_cap {
                    out.push_str("\n[... texto truncado ...]");
                }
                out.push('\n');
            }
            _ => out.push_str("(texto não extraído)\n"),
        }
    }
    out
}

fn render_context(context: Option<&Value>) -> String {
    match context {
        None | Some(Value::Null) => String::new(),
        Some(Value::Object(map)) if map.is_empty() => String::new(),
        Some(Value::String(s)) if s.trim().is_empty() => String::new(),
        Some(Value::String(s)) => format!("=== CONTEXTO ADICIONAL ===\n{s}"),
        Some(value) => format!(
            "=== CONTEXTO ADICIONAL ===\n{}",
            serde_json::to_string_pretty(value).unwrap_or_default()
        ),
    }
}

/// Everything the chat system prompt is built from.
pub struct ChatPromptInput<'a> {
    pub action: ChatAction,
    pub documents: &'a [KnowledgeDocument],
    pub files: &'a [UploadedFile],
    pub context: Option<&'a Value>,
    /// Cap on each document's full-content section
    pub knowledge_content_chars: usize,
    /// Cap on each file's extracted text
    pub file_content_chars: usize,
}

pub fn assemble_chat_system_prompt(input: &ChatPromptInput<'_>) -> String {
    [
        PERSONA.to_string(),
        input.action.instruction().to_string(),
        render_knowledge(input.documents, input.knowledge_content_chars),
        render_files(input.files, input.file_content_chars),
        render_context(input.context),
    ]
    .into_iter()
    .filter(|layer| !layer.is_empty())
    .collect::<Vec<_>>()
    .join("\n\n")
}

/// Default system prompt plus request context, for the unified engine.
pub fn with_context(system_prompt: &str, context: Option<&Value>) -> String {
    let rendered = render_context(context);
    if rendered.is_empty() {
        system_prompt.to_string()
    } else {
        format!("{system_prompt}\n\n{rendered}")
    }
}
