use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_data, output_empty_collection, output_success, render_tree};
use crate::cli::{connect, OutputFormat};
use crate::taxonomy::model::TaxonomyTree;
use crate::taxonomy::mutation::{NodeDraft, NodeInput};
use crate::types::{NodeId, NodeKind};

#[derive(Subcommand)]
pub enum TaxonomyCommands {
    #[command(about = "Print the Grade / Topic / Section tree")]
    Tree,

    #[command(about = "Manage grades")]
    Grade {
        #[command(subcommand)]
        cmd: NodeCommands,
    },

    #[command(about = "Manage topics")]
    Topic {
        #[command(subcommand)]
        cmd: NodeCommands,
    },

    #[command(about = "Manage sections")]
    Section {
        #[command(subcommand)]
        cmd: NodeCommands,
    },
}

#[derive(Subcommand)]
pub enum NodeCommands {
    #[command(about = "Create a node")]
    Create {
        #[arg(long, help = "Display name")]
        name: String,
        #[arg(long, help = "URL slug, unique among siblings")]
        slug: String,
        #[arg(long, help = "Sort order (defaults to 0)")]
        order: Option<String>,
        #[arg(long, help = "Parent id or slug: the grade of a topic, the topic of a section")]
        parent: Option<String>,
    },

    #[command(about = "Update a node; omitted fields keep their current value")]
    Update {
        #[arg(help = "Node id or slug")]
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long)]
        order: Option<String>,
        #[arg(long, help = "Move under another parent")]
        parent: Option<String>,
    },

    #[command(about = "Delete a node; refused while it still has children")]
    Delete {
        #[arg(help = "Node id or slug")]
        id: String,
    },
}

pub async fn handle(cmd: TaxonomyCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TaxonomyCommands::Tree => {
            let console = connect()?;
            let tree = console.tree().fetch_tree().await?;
            if tree.is_empty() {
                return output_empty_collection(&output_format, "grades", "No grades defined");
            }
            let data = json!({ "grades": tree.grades(), "counts": tree.counts() });
            output_data(&output_format, &data, &render_tree(&tree))
        }
        TaxonomyCommands::Grade { cmd } => handle_node(NodeKind::Grade, cmd, output_format).await,
        TaxonomyCommands::Topic { cmd } => handle_node(NodeKind::Topic, cmd, output_format).await,
        TaxonomyCommands::Section { cmd } => handle_node(NodeKind::Section, cmd, output_format).await,
    }
}

async fn handle_node(kind: NodeKind, cmd: NodeCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let console = connect()?;
    let tree = console.tree().fetch_tree().await?;
    let taxonomy = console.taxonomy();

    match cmd {
        NodeCommands::Create {
            name,
            slug,
            order,
            parent,
        } => {
            let input = NodeInput::from_form(&name, &slug, order.as_deref());
            let parent = match (kind.parent_kind(), parent) {
                (Some(parent_kind), Some(key)) => Some(resolve(&tree, parent_kind, &key)?),
                _ => None,
            };

            let mut draft = NodeDraft::blank(kind, parent);
            draft.name = input.name;
            draft.slug = input.slug;
            draft.order = input.order.to_string();
            let record = taxonomy.save_draft(&draft).await?;

            output_success(
                &output_format,
                &format!("Created {} '{}' ({})", kind, record.name, record.id),
                Some(json!({ "id": record.id, "slug": record.slug })),
            )
        }
        NodeCommands::Update {
            id,
            name,
            slug,
            order,
            parent,
        } => {
            let id = resolve(&tree, kind, &id)?;
            let mut draft = prefill(&tree, kind, &id)?;
            if let Some(name) = name {
                draft.name = name;
            }
            if let Some(slug) = slug {
                draft.slug = slug;
            }
            if let Some(order) = order {
                draft.order = order;
            }
            if let (Some(parent_kind), Some(key)) = (kind.parent_kind(), parent) {
                draft.parent_id = Some(resolve(&tree, parent_kind, &key)?);
            }
            let record = taxonomy.save_draft(&draft).await?;

            output_success(
                &output_format,
                &format!("Updated {} '{}' ({})", kind, record.name, record.id),
                Some(json!({ "id": record.id, "slug": record.slug })),
            )
        }
        NodeCommands::Delete { id } => {
            let id = resolve(&tree, kind, &id)?;
            match kind {
                NodeKind::Grade => taxonomy.delete_grade(&id).await?,
                NodeKind::Topic => taxonomy.delete_topic(&id).await?,
                NodeKind::Section => taxonomy.delete_section(&id).await?,
            }
            output_success(&output_format, &format!("Deleted {} '{}'", kind, id), Some(json!({ "id": id })))
        }
    }
}

/// Accept an id, or a slug when it is unambiguous across the tree
pub(crate) fn resolve(tree: &TaxonomyTree, kind: NodeKind, key: &str) -> anyhow::Result<NodeId> {
    if tree.contains(kind, key) {
        return Ok(key.to_string());
    }

    let matches: Vec<&NodeId> = match kind {
        NodeKind::Grade => tree.grades().iter().filter(|g| g.slug == key).map(|g| &g.id).collect(),
        NodeKind::Topic => tree
            .grades()
            .iter()
            .flat_map(|g| tree.topics_of(&g.id))
            .filter(|t| t.slug == key)
            .map(|t| &t.id)
            .collect(),
        NodeKind::Section => tree
            .grades()
            .iter()
            .flat_map(|g| tree.topics_of(&g.id))
            .flat_map(|t| tree.sections_of(&t.id))
            .filter(|s| s.slug == key)
            .map(|s| &s.id)
            .collect(),
    };

    match matches.as_slice() {
        [id] => Ok((*id).clone()),
        [] => Err(anyhow::anyhow!("No {} with id or slug '{}'", kind, key)),
        _ => Err(anyhow::anyhow!("Slug '{}' matches several {}s; use the id", key, kind)),
    }
}

fn prefill(tree: &TaxonomyTree, kind: NodeKind, id: &str) -> anyhow::Result<NodeDraft> {
    let draft = match kind {
        NodeKind::Grade => tree.grade(id).map(NodeDraft::from_grade),
        NodeKind::Topic => tree.topic(id).map(NodeDraft::from_topic),
        NodeKind::Section => tree.section(id).map(NodeDraft::from_section),
    };
    draft.ok_or_else(|| anyhow::anyhow!("{} '{}' not found", kind, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::model::fixtures::{grade, sample_grades, sample_tree, topic};

    #[test]
    fn resolves_ids_and_unique_slugs() {
        let tree = sample_tree();
        assert_eq!(resolve(&tree, NodeKind::Topic, "cd-1").unwrap(), "cd-1");
        assert!(resolve(&tree, NodeKind::Section, "missing").is_err());

        let mut grades = sample_grades();
        grades.push(grade("g-x", "Khác", 9, vec![topic("t-x", "X", 0, vec![])]));
        grades[3].topics[0].slug = "hinh-hoc".into();
        let tree = TaxonomyTree::from_grades(grades);
        assert_eq!(resolve(&tree, NodeKind::Topic, "hinh-hoc").unwrap(), "t-x");
    }

    #[test]
    fn shared_slugs_need_an_id() {
        let mut grades = sample_grades();
        grades.push(grade("g-x", "Khác", 9, vec![topic("t-x", "X", 0, vec![])]));
        grades.push(grade("g-y", "Thêm", 10, vec![topic("t-y", "Y", 0, vec![])]));
        grades[3].topics[0].slug = "shared".into();
        grades[4].topics[0].slug = "shared".into();
        let tree = TaxonomyTree::from_grades(grades);
        assert!(resolve(&tree, NodeKind::Topic, "shared").is_err());
    }
}
