//! Anki note types, one per card kind.

use serde_json::{json, Value};

use deckgen_core::{CardContent, CardKind};

const CSS: &str = ".card {\n font-family: arial;\n font-size: 20px;\n text-align: center;\n color: black;\n background-color: white;\n}\n";
const CLOZE_CSS: &str = ".cloze {\n font-weight: bold;\n color: blue;\n}\n";

const LATEX_PRE: &str = "\\documentclass[12pt]{article}\n\\special{papersize=3in,5in}\n\\usepackage[utf8]{inputenc}\n\\usepackage{amssymb,amsmath}\n\\pagestyle{empty}\n\\setlength{\\parindent}{0in}\n\\begin{document}\n";
const LATEX_POST: &str = "\\end{document}";

/// Fixed note type for a card kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteType {
    /// Model name shown in Anki
    pub name: &'static str,
    /// Field names, in order
    pub fields: &'static [&'static str],
    /// Card template name
    pub template_name: &'static str,
    /// Front template
    pub front: &'static str,
    /// Back template
    pub back: &'static str,
    /// Whether this is a cloze model (Anki model type 1)
    pub cloze: bool,
}

impl NoteType {
    /// The note type used for `kind`.
    pub fn for_kind(kind: CardKind) -> Self {
        match kind {
            CardKind::Basic => NoteType {
                name: "Basic Card",
                fields: &["Question", "Answer"],
                template_name: "Card 1",
                front: "{{Question}}",
                back: "{{FrontSide}}<hr id=\"answer\">{{Answer}}",
                cloze: false,
            },
            CardKind::Cloze => NoteType {
                name: "Cloze Card",
                fields: &["Text", "Extra"],
                template_name: "Cloze",
                front: "{{cloze:Text}}",
                back: "{{cloze:Text}}<hr id=\"extra\">{{Extra}}",
                cloze: true,
            },
            CardKind::MultipleChoice => NoteType {
                name: "Multiple Choice Card",
                fields: &["Question", "Options", "Answer"],
                template_name: "Card 1",
                front: "{{Question}}<br><br>{{Options}}",
                back: "{{FrontSide}}<hr id=\"answer\">{{Answer}}",
                cloze: false,
            },
        }
    }

    /// Note field values for a card, in field order.
    pub fn fields_for(&self, content: &CardContent) -> Vec<String> {
        match content {
            CardContent::Basic { question, answer } => vec![question.clone(), answer.clone()],
            CardContent::Cloze { text } => vec![text.clone(), String::new()],
            CardContent::MultipleChoice { question, options, correct_index } => {
                let letter = content.correct_letter().unwrap_or('A');
                let answer = match options.get(*correct_index) {
                    Some(text) => format!("{}. {}", letter, text),
                    None => letter.to_string(),
                };
                vec![question.clone(), content.rendered_options().unwrap_or_default(), answer]
            }
        }
    }

    /// Card ordinals generated by one note: one per cloze number, else just 0.
    pub fn ordinals_for(&self, content: &CardContent) -> Vec<i64> {
        if self.cloze {
            content.cloze_ordinals().into_iter().map(|n| i64::from(n) - 1).collect()
        } else {
            vec![0]
        }
    }

    /// Model definition as stored in `col.models`.
    pub fn to_model_json(&self, model_id: i64, deck_id: i64, modified: i64) -> Value {
        let flds: Vec<Value> = self
            .fields
            .iter()
            .enumerate()
            .map(|(ord, name)| {
                json!({
                    "font": "Arial",
                    "media": [],
                    "name": name,
                    "ord": ord,
                    "rtl": false,
                    "size": 20,
                    "sticky": false,
                })
            })
            .collect();

        let css = if self.cloze { format!("{}\n{}", CSS, CLOZE_CSS) } else { CSS.to_string() };
        let model_type = if self.cloze { 1 } else { 0 };

        json!({
            "css": css,
            "did": deck_id,
            "flds": flds,
            "id": model_id,
            "latexPost": LATEX_POST,
            "latexPre": LATEX_PRE,
            "mod": modified,
            "name": self.name,
            "req": [[0, "any", [0]]],
            "sortf": 0,
            "tags": [],
            "tmpls": [{
                "afmt": self.back,
                "bafmt": "",
                "bqfmt": "",
                "did": null,
                "name": self.template_name,
                "ord": 0,
                "qfmt": self.front,
            }],
            "type": model_type,
            "usn": -1,
            "vers": [],
        })
    }
}
