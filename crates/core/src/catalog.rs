//! Catalog model - the chapter/section outline produced by catalog analysis.

use serde::{Deserialize, Serialize};

/// One chapter of an analysed outline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Hierarchical id ("1", "2", ...)
    #[serde(default)]
    pub id: String,

    /// Chapter title
    pub title: String,

    /// Chapter description
    #[serde(default)]
    pub description: String,

    /// Ordered sections
    #[serde(default)]
    pub sections: Vec<CatalogSection>,
}

/// A section (or subsection) inside a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogSection {
    /// Hierarchical id ("1.1", "1.1.2", ...)
    #[serde(default)]
    pub id: String,

    /// Section title
    pub title: String,

    /// Section description
    #[serde(default)]
    pub description: String,

    /// Ordered subsections
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subsections: Vec<CatalogSection>,
}

/// Borrowed view of any node in a catalog tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogNode<'a> {
    /// A top-level chapter
    Chapter(&'a CatalogEntry),
    /// A section or subsection
    Section(&'a CatalogSection),
}

impl<'a> CatalogNode<'a> {
    /// Node id.
    pub fn id(&self) -> &'a str {
        match self {
            CatalogNode::Chapter(c) => &c.id,
            CatalogNode::Section(s) => &s.id,
        }
    }

    /// Node title.
    pub fn title(&self) -> &'a str {
        match self {
            CatalogNode::Chapter(c) => &c.title,
            CatalogNode::Section(s) => &s.title,
        }
    }

    /// Node description.
    pub fn description(&self) -> &'a str {
        match self {
            CatalogNode::Chapter(c) => &c.description,
            CatalogNode::Section(s) => &s.description,
        }
    }
}

impl CatalogEntry {
    /// Create a chapter without sections.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            description: description.into(),
            sections: Vec::new(),
        }
    }

    /// Add a section.
    pub fn with_section(mut self, section: CatalogSection) -> Self {
        self.sections.push(section);
        self
    }

    /// Renumber a whole outline in document order: "1", "1.1", "1.1.1".
    pub fn assign_ids(entries: &mut [CatalogEntry]) {
        for (idx, chapter) in entries.iter_mut().enumerate() {
            chapter.id = (idx + 1).to_string();
            assign_section_ids(&chapter.id, &mut chapter.sections);
        }
    }

    /// Find a chapter, section or subsection by id.
    pub fn find<'a>(entries: &'a [CatalogEntry], id: &str) -> Option<CatalogNode<'a>> {
        for chapter in entries {
            if chapter.id == id {
                return Some(CatalogNode::Chapter(chapter));
            }
            if let Some(found) = find_section(&chapter.sections, id) {
                return Some(CatalogNode::Section(found));
            }
        }
        None
    }

    /// Total number of sections and subsections.
    pub fn section_count(&self) -> usize {
        fn count(sections: &[CatalogSection]) -> usize {
            sections.iter().map(|s| 1 + count(&s.subsections)).sum()
        }
        count(&self.sections)
    }
}

impl CatalogSection {
    /// Create a section without subsections.
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            description: description.into(),
            subsections: Vec::new(),
        }
    }
}

fn assign_section_ids(parent: &str, sections: &mut [CatalogSection]) {
    for (idx, section) in sections.iter_mut().enumerate() {
        section.id = format!("{}.{}", parent, idx + 1);
        let id = section.id.clone();
        assign_section_ids(&id, &mut section.subsections);
    }
}

fn find_section<'a>(sections: &'a [CatalogSection], id: &str) -> Option<&'a CatalogSection> {
    for section in sections {
        if section.id == id {
            return Some(section);
        }
        // ids are hierarchical, so only descend into a matching prefix
        if id.starts_with(&format!("{}.", section.id)) {
            return find_section(&section.subsections, id);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outline() -> Vec<CatalogEntry> {
        let mut nested = CatalogSection::new("Borrowing", "References");
        nested.subsections.push(CatalogSection::new("Lifetimes", "Elision rules"));

        vec![
            CatalogEntry::new("Ownership", "Moves and drops")
                .with_section(CatalogSection::new("Moves", ""))
                .with_section(nested),
            CatalogEntry::new("Traits", "Shared behaviour"),
        ]
    }

    #[test]
    fn test_assign_ids_hierarchical() {
        let mut entries = outline();
        CatalogEntry::assign_ids(&mut entries);

        assert_eq!(entries[0].id, "1");
        assert_eq!(entries[0].sections[0].id, "1.1");
        assert_eq!(entries[0].sections[1].id, "1.2");
        assert_eq!(entries[0].sections[1].subsections[0].id, "1.2.1");
        assert_eq!(entries[1].id, "2");
    }

    #[test]
    fn test_find_nodes() {
        let mut entries = outline();
        CatalogEntry::assign_ids(&mut entries);

        assert_eq!(CatalogEntry::find(&entries, "2").unwrap().title(), "Traits");
        assert_eq!(CatalogEntry::find(&entries, "1.2").unwrap().title(), "Borrowing");
        let lifetimes = CatalogEntry::find(&entries, "1.2.1").unwrap();
        assert_eq!(lifetimes.title(), "Lifetimes");
        assert_eq!(lifetimes.description(), "Elision rules");
        assert!(CatalogEntry::find(&entries, "3.1").is_none());
    }

    #[test]
    fn test_section_count() {
        let entries = outline();
        assert_eq!(entries[0].section_count(), 3);
        assert_eq!(entries[1].section_count(), 0);
    }
}
