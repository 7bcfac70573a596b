/// Entity rendering — Markdown and typeset (LaTeX) text for a single entity.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::core::table::Table;
use crate::schema::entity::Entity;

/// Output format of a rendered entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextType {
    #[default]
    Markdown,
    Typeset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RenderOptions {
    pub text_type: TextType,
    /// Include the long-form `full_text` field (Markdown only).
    pub include_full_text: bool,
    /// Leave out the table section.
    pub skip_table: bool,
    /// Escape Markdown emphasis characters for HTML-backed viewers.
    pub escape_for_output: bool,
}

impl RenderOptions {
    pub fn markdown() -> Self {
        Self::default()
    }

    pub fn typeset() -> Self {
        Self {
            text_type: TextType::Typeset,
            ..Self::default()
        }
    }
}

/// Turns an entity into display text.
pub trait Renderer {
    fn render(&self, entity: &Entity, options: &RenderOptions) -> String;

    /// The block appended to an entity whose table was rolled.
    fn table_result(&self, outcome: &str, options: &RenderOptions) -> String;
}

/// The stock renderer for both output formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityRenderer;

impl Renderer for EntityRenderer {
    fn render(&self, entity: &Entity, options: &RenderOptions) -> String {
        match options.text_type {
            TextType::Markdown if options.escape_for_output => {
                markdown(&map_text(entity, escape_markdown), options)
            }
            TextType::Markdown => markdown(entity, options),
            TextType::Typeset => typeset(&map_text(entity, escape_typeset), options),
        }
    }

    fn table_result(&self, outcome: &str, options: &RenderOptions) -> String {
        match options.text_type {
            TextType::Markdown if options.escape_for_output => {
                format!("Table Result:  \n{}\n", escape_markdown(outcome))
            }
            TextType::Markdown => format!("Table Result:  \n{}\n", outcome),
            TextType::Typeset => {
                let mut out = String::new();
                tex_field(&mut out, &escape_typeset(outcome), Some("Table Result"));
                out
            }
        }
    }
}

/// Copy of `entity` with `f` applied to every text and list field.
fn map_text(entity: &Entity, f: fn(&str) -> String) -> Entity {
    let list = |values: &[String]| values.iter().map(|v| f(v)).collect::<Vec<_>>();
    Entity {
        name: f(&entity.name),
        clean_name: entity.clean_name.clone(),
        hp: f(&entity.hp),
        scores: list(&entity.scores),
        skills: list(&entity.skills),
        holds: f(&entity.holds),
        tags: list(&entity.tags),
        requirements: list(&entity.requirements),
        cost: list(&entity.cost),
        speed: f(&entity.speed),
        target: f(&entity.target),
        to_hit: f(&entity.to_hit),
        attacks: list(&entity.attacks),
        effect: f(&entity.effect),
        table: entity.table.clone(),
        flavor_text: f(&entity.flavor_text),
        full_text: f(&entity.full_text),
        encumbrance: f(&entity.encumbrance),
        meta_tags: entity.meta_tags.clone(),
    }
}

fn escape_markdown(text: &str) -> String {
    text.replace('_', r"\_")
        .replace('*', r"\*")
        .replace("->", "&#8658;")
}

fn escape_typeset(text: &str) -> String {
    static UNDERSCORE: OnceLock<Regex> = OnceLock::new();
    let underscore =
        UNDERSCORE.get_or_init(|| Regex::new(r"([a-z0-9])_").expect("underscore pattern compiles"));
    let text = text.replace(['{', '}'], "");
    underscore
        .replace_all(&text, r"${1}\_")
        .replace("->", r"$\Rightarrow$")
}

// Markdown

#[derive(Default)]
struct MdField<'a> {
    label: &'a str,
    prefix: &'a str,
    wrapper: &'a str,
}

fn md_field(out: &mut String, text: &str, field: MdField<'_>) {
    if text.is_empty() {
        return;
    }
    out.push_str(field.wrapper);
    if !field.label.is_empty() {
        out.push_str(&format!("**{}:** ", field.label));
    } else {
        out.push_str(field.prefix);
    }
    out.push_str(text);
    out.push_str(field.wrapper);
    out.push_str("  \n");
}

fn labelled(label: &str) -> MdField<'_> {
    MdField {
        label,
        ..MdField::default()
    }
}

fn markdown(entity: &Entity, options: &RenderOptions) -> String {
    let mut out = String::new();
    let prefix = MdField {
        prefix: "#### ",
        ..MdField::default()
    };
    md_field(&mut out, &entity.name, prefix);
    md_field(&mut out, &entity.hp, labelled("HP"));
    md_field(&mut out, &entity.scores.join(", "), labelled("Scores"));
    md_field(&mut out, &entity.skills.join(", "), labelled("Skills"));
    md_field(&mut out, &entity.holds, labelled("Holds"));
    md_field(&mut out, &entity.tags.join(", "), labelled("Tags"));
    md_field(&mut out, &entity.requirements.join(", "), labelled("Requirements"));
    md_field(&mut out, &entity.cost.join(", "), labelled("Cost"));
    md_field(&mut out, &entity.speed, labelled("Speed"));
    md_field(&mut out, &entity.target, labelled("Target"));
    md_field(&mut out, &entity.to_hit, labelled("To-Hit"));
    md_field(&mut out, &entity.attacks.join(", "), MdField::default());
    md_field(&mut out, &entity.effect, MdField::default());
    if let Some(table) = entity.table.as_ref().filter(|_| !options.skip_table) {
        md_field(&mut out, &markdown_table(table), MdField::default());
    }
    let italic = MdField {
        wrapper: "*",
        ..MdField::default()
    };
    md_field(&mut out, &entity.flavor_text, italic);
    if options.include_full_text && !entity.full_text.is_empty() {
        md_field(&mut out, &format!("{}  \n\n\n", entity.full_text), MdField::default());
    }
    md_field(&mut out, &entity.encumbrance, labelled("Encumbrance"));
    out
}

fn markdown_table(table: &Table) -> String {
    let mut text = String::from("  \n\n");
    if let Some(roll) = &table.roll {
        text.push_str(&format!(
            "Unless otherwise specified, roll {} on this table.",
            roll
        ));
    }
    text.push_str("\n\n| Roll | Outcome |  \n| --- | --- |");
    for (key, outcome) in &table.outcomes {
        text.push_str(&format!("\n| {} | {} |  ", key, outcome));
    }
    text.push('\n');
    text
}

// Typeset

const SMALLSKIP: &str = r"\smallskip ";

fn skipline() -> String {
    format!(r"{} \hrule {}", SMALLSKIP, SMALLSKIP)
}

fn command(name: &str, text: &str) -> String {
    format!(r"\{}{{{}}}", name, text)
}

fn tex_field(out: &mut String, text: &str, label: Option<&str>) {
    if text.is_empty() {
        return;
    }
    if let Some(label) = label {
        out.push_str(&command("emph", &format!("{}:", label)));
        out.push(' ');
    }
    out.push_str(text);
    out.push_str(" \n \n");
}

fn typeset(entity: &Entity, options: &RenderOptions) -> String {
    let mut out = String::new();
    tex_field(
        &mut out,
        &command("textbf", &command("large", &entity.name)),
        None,
    );
    tex_field(&mut out, &entity.hp, Some("HP"));
    tex_field(&mut out, &entity.scores.join(", "), Some("Scores"));
    if !entity.skills.is_empty() {
        let skills = format!("{}{}", skipline(), entity.skills.join("\n \\medskip\n"));
        tex_field(&mut out, &skills, Some("Skills"));
    }
    tex_field(&mut out, &entity.holds, Some("Holds"));
    tex_field(&mut out, &entity.tags.join(", "), Some("Tags"));
    tex_field(&mut out, &entity.requirements.join(", "), Some("Requirements"));
    tex_field(&mut out, &entity.cost.join(", "), Some("Cost"));
    tex_field(&mut out, &entity.speed, Some("Speed"));
    tex_field(&mut out, &entity.target, Some("Target"));
    tex_field(&mut out, &entity.to_hit, Some("To-Hit"));
    if !entity.attacks.is_empty() {
        let items: String = entity
            .attacks
            .iter()
            .map(|a| format!("    \\item {}\n", a))
            .collect();
        let attacks = format!(
            "{}{}\n\\begin{{itemize}}\n{}\n\\end{{itemize}}",
            skipline(),
            command("emph", "Attacks: "),
            items
        );
        tex_field(&mut out, &attacks, None);
    }
    tex_field(&mut out, &entity.effect, None);
    if let Some(table) = entity.table.as_ref().filter(|_| !options.skip_table) {
        tex_field(&mut out, &typeset_table(table), None);
    }
    if !entity.flavor_text.is_empty() {
        let flavor = format!("{}{}", skipline(), command("textit", &entity.flavor_text));
        tex_field(&mut out, &flavor, None);
    }
    if !entity.encumbrance.is_empty() {
        out.push_str(&format!("\\vfill\n\\hfill Enc: {}\n", entity.encumbrance));
    }
    out
}

fn typeset_table(table: &Table) -> String {
    let mut text = String::new();
    if let Some(roll) = &table.roll {
        text.push_str(&format!("\n\nRoll {} on this table.\n\n", roll));
    }
    text.push_str("\\smallskip\\begin{center}\n\\begin{tabularx}{\\textwidth}{ | c | X | }");
    for (key, outcome) in &table.outcomes {
        text.push_str(&format!("\n\\hline\n{} & {} \\\\", key, outcome));
    }
    text.push_str("\n    \\hline\n\\end{tabularx}\n\\end{center}");
    text
}
