//! Taxonomy tree: Grades own Topics, Topics own Sections.
//!
//! The tree is fetched whole and normalized on construction: parent ids are
//! filled in from nesting and every sibling group is sorted by `order`
//! ascending (stable, so ties keep the service's order).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::types::{NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub id: NodeId,
    pub name: String,
    pub slug: String,
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: i64,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub id: NodeId,
    #[serde(default)]
    pub grade_id: NodeId,
    pub name: String,
    pub slug: String,
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: i64,
    #[serde(default)]
    pub sections: Vec<Section>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: NodeId,
    #[serde(default)]
    pub topic_id: NodeId,
    pub name: String,
    pub slug: String,
    #[serde(default, deserialize_with = "lenient_order")]
    pub order: i64,
}

/// Accepts a number, a numeric string, or anything else as 0
pub(crate) fn lenient_order<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

/// A content item's place in the taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Classification {
    pub grade_id: NodeId,
    pub topic_id: NodeId,
    pub section_id: NodeId,
}

/// Display names for a classification path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationLabels {
    pub grade: String,
    pub topic: String,
    pub section: String,
}

impl std::fmt::Display for ClassificationLabels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} / {} / {}", self.grade, self.topic, self.section)
    }
}

const MISSING_LABEL: &str = "(deleted)";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeCounts {
    pub grades: usize,
    pub topics: usize,
    pub sections: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TaxonomyTree {
    grades: Vec<Grade>,
    grade_index: HashMap<NodeId, usize>,
    topic_index: HashMap<NodeId, (usize, usize)>,
    section_index: HashMap<NodeId, (usize, usize, usize)>,
    warnings: Vec<String>,
}

impl TaxonomyTree {
    pub fn from_grades(mut grades: Vec<Grade>) -> Self {
        grades.sort_by_key(|g| g.order);
        for grade in grades.iter_mut() {
            grade.topics.sort_by_key(|t| t.order);
            for topic in grade.topics.iter_mut() {
                topic.grade_id = grade.id.clone();
                topic.sections.sort_by_key(|s| s.order);
                for section in topic.sections.iter_mut() {
                    section.topic_id = topic.id.clone();
                }
            }
        }

        let mut tree = Self {
            grades,
            ..Default::default()
        };
        tree.build_indexes();
        tree
    }

    fn build_indexes(&mut self) {
        let mut warnings = Vec::new();
        let mut seen_ids: HashSet<&str> = HashSet::new();

        check_slugs("grades", self.grades.iter().map(|g| g.slug.as_str()), &mut warnings);
        for (gi, grade) in self.grades.iter().enumerate() {
            if !seen_ids.insert(&grade.id) {
                warnings.push(format!("duplicate node id '{}'", grade.id));
            }
            self.grade_index.insert(grade.id.clone(), gi);

            let scope = format!("topics of grade '{}'", grade.slug);
            check_slugs(&scope, grade.topics.iter().map(|t| t.slug.as_str()), &mut warnings);
            for (ti, topic) in grade.topics.iter().enumerate() {
                if !seen_ids.insert(&topic.id) {
                    warnings.push(format!("duplicate node id '{}'", topic.id));
                }
                self.topic_index.insert(topic.id.clone(), (gi, ti));

                let scope = format!("sections of topic '{}'", topic.slug);
                check_slugs(&scope, topic.sections.iter().map(|s| s.slug.as_str()), &mut warnings);
                for (si, section) in topic.sections.iter().enumerate() {
                    if !seen_ids.insert(&section.id) {
                        warnings.push(format!("duplicate node id '{}'", section.id));
                    }
                    self.section_index.insert(section.id.clone(), (gi, ti, si));
                }
            }
        }

        self.warnings = warnings;
    }

    pub fn grades(&self) -> &[Grade] {
        &self.grades
    }

    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }

    pub fn grade(&self, id: &str) -> Option<&Grade> {
        self.grade_index.get(id).map(|&gi| &self.grades[gi])
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topic_index
            .get(id)
            .map(|&(gi, ti)| &self.grades[gi].topics[ti])
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.section_index
            .get(id)
            .map(|&(gi, ti, si)| &self.grades[gi].topics[ti].sections[si])
    }

    /// Topics under a Grade in ascending order; empty for an unknown Grade
    pub fn topics_of(&self, grade_id: &str) -> &[Topic] {
        self.grade(grade_id).map(|g| g.topics.as_slice()).unwrap_or(&[])
    }

    /// Sections under a Topic in ascending order; empty for an unknown Topic
    pub fn sections_of(&self, topic_id: &str) -> &[Section] {
        self.topic(topic_id).map(|t| t.sections.as_slice()).unwrap_or(&[])
    }

    pub fn grade_by_slug(&self, slug: &str) -> Option<&Grade> {
        self.grades.iter().find(|g| g.slug == slug)
    }

    pub fn topic_by_slug(&self, grade_id: &str, slug: &str) -> Option<&Topic> {
        self.topics_of(grade_id).iter().find(|t| t.slug == slug)
    }

    pub fn section_by_slug(&self, topic_id: &str, slug: &str) -> Option<&Section> {
        self.sections_of(topic_id).iter().find(|s| s.slug == slug)
    }

    pub fn contains(&self, kind: NodeKind, id: &str) -> bool {
        match kind {
            NodeKind::Grade => self.grade_index.contains_key(id),
            NodeKind::Topic => self.topic_index.contains_key(id),
            NodeKind::Section => self.section_index.contains_key(id),
        }
    }

    /// Whether a node owns children in this snapshot
    pub fn has_children(&self, kind: NodeKind, id: &str) -> bool {
        match kind {
            NodeKind::Grade => !self.topics_of(id).is_empty(),
            NodeKind::Topic => !self.sections_of(id).is_empty(),
            NodeKind::Section => false,
        }
    }

    /// True iff the Topic is a child of the Grade and the Section a child of the Topic
    pub fn contains_path(&self, grade_id: &str, topic_id: &str, section_id: &str) -> bool {
        match (self.topic(topic_id), self.section(section_id)) {
            (Some(topic), Some(section)) => {
                topic.grade_id == grade_id && section.topic_id == topic_id
            }
            _ => false,
        }
    }

    pub fn labels(&self, classification: &Classification) -> ClassificationLabels {
        let name_or_missing = |name: Option<&String>| {
            name.cloned().unwrap_or_else(|| MISSING_LABEL.to_string())
        };
        ClassificationLabels {
            grade: name_or_missing(self.grade(&classification.grade_id).map(|g| &g.name)),
            topic: name_or_missing(self.topic(&classification.topic_id).map(|t| &t.name)),
            section: name_or_missing(self.section(&classification.section_id).map(|s| &s.name)),
        }
    }

    pub fn counts(&self) -> TreeCounts {
        TreeCounts {
            grades: self.grade_index.len(),
            topics: self.topic_index.len(),
            sections: self.section_index.len(),
        }
    }

    /// Sibling slug collisions and duplicate ids found while indexing
    pub fn integrity_warnings(&self) -> &[String] {
        &self.warnings
    }
}

fn check_slugs<'a>(scope: &str, slugs: impl Iterator<Item = &'a str>, warnings: &mut Vec<String>) {
    let mut seen = HashSet::new();
    for slug in slugs {
        if !seen.insert(slug) {
            warnings.push(format!("duplicate slug '{}' among {}", slug, scope));
        }
    }
}
