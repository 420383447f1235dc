use anyhow::{Context, Result, anyhow, bail};
use medscope::{Audience, RenderEvent, SynthesisKind};
use std::path::PathBuf;

pub const HELP: &str = "\
Documents
  upload <path>                 upload a PDF
  list                          list documents
  select <doc>                  focus a document (again to unfocus)
  delete <doc>                  delete a document
  summarize <doc>               summarize for the current audience
  related <doc>                 documents sharing topics with <doc>
  synthesize <type> [<doc>...]  comparison|evolution|consensus|methods across
                                the given documents, or all of them
Viewer
  open                          resolve the focused PDF and its outline
  next | prev | page <n>        navigate
  zoom in | zoom out            zoom
  loaded <pages>                renderer: document loaded
  load-failed <message>         renderer: document failed
  page-ok <n>                   renderer: page rendered
  page-failed <n> <message>     renderer: page failed
Knowledge panel
  explain <text> | <question> [| <context>]
  evidence <text>
  close
Chat
  ask <question>                ask about the focused document
  ask-all <question>            ask across every document
Other
  search <query>                similar papers
  audience [clinician|patient|researcher]
  health | state | help | quit
<doc> is a document id or its number in `list`.";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Upload(PathBuf),
    List,
    Select(String),
    Delete(String),
    Summarize(String),
    Related(String),
    Synthesize {
        kind: SynthesisKind,
        documents: Vec<String>,
    },
    Open,
    NextPage,
    PreviousPage,
    GoToPage(u32),
    ZoomIn,
    ZoomOut,
    Render(RenderEvent),
    Explain {
        text: String,
        question: String,
        context: String,
    },
    Evidence(String),
    ClosePanel,
    Ask(String),
    AskAll(String),
    Search(String),
    Audience(Option<Audience>),
    Health,
    State,
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str> {
    let rest = rest.trim();
    if rest.is_empty() {
        bail!("usage: {}", usage);
    }
    Ok(rest)
}

fn page_number(value: &str) -> Result<u32> {
    value
        .trim()
        .parse()
        .with_context(|| format!("not a page number: {}", value.trim()))
}

impl Command {
    /// Parses one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Command>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        let command = match verb.to_ascii_lowercase().as_str() {
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "upload" => Command::Upload(PathBuf::from(required(rest, "upload <path>")?)),
            "list" | "ls" => Command::List,
            "select" => Command::Select(required(rest, "select <doc>")?.to_string()),
            "delete" | "rm" => Command::Delete(required(rest, "delete <doc>")?.to_string()),
            "summarize" => Command::Summarize(required(rest, "summarize <doc>")?.to_string()),
            "related" => Command::Related(required(rest, "related <doc>")?.to_string()),
            "synthesize" => {
                let usage = "synthesize <type> [<doc>...]";
                let mut words = required(rest, usage)?.split_whitespace();
                let kind = words.next().unwrap_or_default().parse()?;
                Command::Synthesize {
                    kind,
                    documents: words.map(str::to_string).collect(),
                }
            }
            "open" => Command::Open,
            "next" => Command::NextPage,
            "prev" | "previous" => Command::PreviousPage,
            "page" => Command::GoToPage(page_number(required(rest, "page <n>")?)?),
            "zoom" => match rest {
                "in" | "+" => Command::ZoomIn,
                "out" | "-" => Command::ZoomOut,
                _ => bail!("usage: zoom in | zoom out"),
            },
            "loaded" => Command::Render(RenderEvent::DocumentLoaded {
                num_pages: page_number(required(rest, "loaded <pages>")?)?,
            }),
            "load-failed" => Command::Render(RenderEvent::DocumentFailed {
                message: required(rest, "load-failed <message>")?.to_string(),
            }),
            "page-ok" => Command::Render(RenderEvent::PageLoaded {
                page: page_number(required(rest, "page-ok <n>")?)?,
            }),
            "page-failed" => {
                let rest = required(rest, "page-failed <n> <message>")?;
                let (page, message) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                Command::Render(RenderEvent::PageFailed {
                    page: page_number(page)?,
                    message: message.trim().to_string(),
                })
            }
            "explain" => {
                let usage = "explain <text> | <question> [| <context>]";
                let mut parts = required(rest, usage)?.splitn(3, '|').map(str::trim);
                let text = parts.next().unwrap_or_default();
                let question = parts.next().unwrap_or_default();
                if text.is_empty() || question.is_empty() {
                    bail!("usage: {}", usage);
                }
                Command::Explain {
                    text: text.to_string(),
                    question: question.to_string(),
                    context: parts.next().unwrap_or(text).to_string(),
                }
            }
            "evidence" => Command::Evidence(required(rest, "evidence <text>")?.to_string()),
            "close" => Command::ClosePanel,
            "ask" => Command::Ask(required(rest, "ask <question>")?.to_string()),
            "ask-all" => Command::AskAll(required(rest, "ask-all <question>")?.to_string()),
            "search" => Command::Search(required(rest, "search <query>")?.to_string()),
            "audience" if rest.is_empty() => Command::Audience(None),
            "audience" => Command::Audience(Some(rest.parse()?)),
            "health" => Command::Health,
            "state" => Command::State,
            other => return Err(anyhow!("unknown command `{}`; try `help`", other)),
        };
        Ok(Some(command))
    }
}
