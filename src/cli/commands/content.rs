use clap::{Args, Subcommand};
use serde_json::json;
use std::path::PathBuf;

use crate::cli::commands::taxonomy::resolve;
use crate::cli::utils::{output_data, output_empty_collection, output_success};
use crate::cli::{connect, OutputFormat};
use crate::content::approval::{confirm_delete, ApprovalStatus};
use crate::content::model::{ContentItem, ContentKind, ContentPayload, ContentQuery};
use crate::content::validate::{ContentDraft, LocalFile};
use crate::taxonomy::model::TaxonomyTree;
use crate::types::NodeKind;

#[derive(Subcommand)]
pub enum ContentCommands {
    #[command(about = "List content items")]
    List {
        #[arg(long, help = "pending or approved")]
        status: Option<String>,
        #[arg(long)]
        grade: Option<String>,
        #[arg(long)]
        topic: Option<String>,
        #[arg(long)]
        section: Option<String>,
        #[arg(long, help = "Match against titles")]
        search: Option<String>,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        per_page: Option<u32>,
    },

    #[command(about = "Show one content item with its classification path")]
    Show {
        #[arg(help = "Content id")]
        id: String,
    },

    #[command(about = "Submit a new content item")]
    Submit {
        #[arg(long)]
        title: String,
        #[command(flatten)]
        fields: ContentFields,
    },

    #[command(about = "Edit a content item; omitted fields keep their current value")]
    Edit {
        #[arg(help = "Content id")]
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[command(flatten)]
        fields: ContentFields,
    },

    #[command(about = "Approve a pending content item")]
    Approve {
        #[arg(help = "Content id")]
        id: String,
    },

    #[command(about = "Permanently delete a content item")]
    Delete {
        #[arg(help = "Content id")]
        id: String,
        #[arg(long, help = "Confirm the deletion")]
        yes: bool,
    },

    #[command(about = "Show pending / approved counts")]
    Stats,
}

#[derive(Args)]
pub struct ContentFields {
    #[arg(long)]
    description: Option<String>,
    #[arg(long, help = "Grade id or slug")]
    grade: Option<String>,
    #[arg(long, help = "Topic id or slug")]
    topic: Option<String>,
    #[arg(long, help = "Section id or slug")]
    section: Option<String>,
    #[arg(long, conflicts_with = "video_url", help = "Local file to upload")]
    file: Option<PathBuf>,
    #[arg(long, help = "Video-platform URL")]
    video_url: Option<String>,
    #[arg(long, help = "Banner image")]
    banner: Option<PathBuf>,
    #[arg(long = "tag", help = "Tag (repeatable, or comma separated)")]
    tags: Vec<String>,
}

impl ContentFields {
    /// Overlay the given flags onto a draft
    fn apply(self, draft: &mut ContentDraft, tree: &TaxonomyTree) -> anyhow::Result<()> {
        if let Some(description) = self.description {
            draft.description = description;
        }

        // Each level is only replaced when given; changing a level clears the ones below
        if let Some(grade) = self.grade {
            draft.picker.select_grade(Some(resolve_or_raw(tree, NodeKind::Grade, &grade)));
        }
        if let Some(topic) = self.topic {
            draft.picker.select_topic(Some(resolve_or_raw(tree, NodeKind::Topic, &topic)));
        }
        if let Some(section) = self.section {
            draft.picker.select_section(Some(resolve_or_raw(tree, NodeKind::Section, &section)));
        }

        if let Some(path) = self.file {
            draft.kind = ContentKind::File;
            draft.file = Some(
                LocalFile::from_path(&path)
                    .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?,
            );
        }
        if let Some(url) = self.video_url {
            draft.kind = ContentKind::Youtube;
            draft.video_url = Some(url);
        }
        if let Some(path) = self.banner {
            draft.banner = Some(
                LocalFile::from_path(&path)
                    .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?,
            );
        }
        if !self.tags.is_empty() {
            draft.tags = self.tags;
        }
        Ok(())
    }
}

/// Unknown keys pass through so the validator reports the path error
fn resolve_or_raw(tree: &TaxonomyTree, kind: NodeKind, key: &str) -> String {
    resolve(tree, kind, key).unwrap_or_else(|_| key.to_string())
}

fn summary_line(item: &ContentItem) -> String {
    let kind = match &item.payload {
        ContentPayload::File(file) => format!("file {}", file.file_name),
        ContentPayload::ExternalVideo { video_id, .. } => format!("video {}", video_id),
    };
    format!("{}  [{}]  {}  ({})", item.id, item.status, item.title, kind)
}

pub async fn handle(cmd: ContentCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let console = connect()?;
    let content = console.content();

    match cmd {
        ContentCommands::List {
            status,
            grade,
            topic,
            section,
            search,
            page,
            per_page,
        } => {
            let status = status
                .map(|s| s.parse::<ApprovalStatus>())
                .transpose()
                .map_err(|e| anyhow::anyhow!(e))?;
            let query = ContentQuery {
                status,
                grade_id: grade,
                topic_id: topic,
                section_id: section,
                search,
                page,
                per_page,
            };
            let listing = content.list(&query).await?;
            if listing.items.is_empty() {
                return output_empty_collection(&output_format, "items", "No content found");
            }

            let mut text: Vec<String> = listing.items.iter().map(summary_line).collect();
            text.push(format!("page {} · {} total", listing.page, listing.total));
            output_data(&output_format, &serde_json::to_value(&listing)?, &text)
        }
        ContentCommands::Show { id } => {
            let item = content.get(&id).await?;
            let labels = content.labels(&item).await?;
            let actions = content.actions(&item);

            let data = json!({
                "item": &item,
                "classification": labels.to_string(),
                "actions": actions,
            });
            let mut text = vec![
                summary_line(&item),
                format!("Classification: {}", labels),
                format!("Tags: {}", item.tags.iter().cloned().collect::<Vec<_>>().join(", ")),
            ];
            if !item.description.is_empty() {
                text.push(format!("Description: {}", item.description));
            }
            output_data(&output_format, &data, &text)
        }
        ContentCommands::Submit { title, fields } => {
            let tree = console.tree().fetch_tree().await?;
            let kind = if fields.video_url.is_some() {
                ContentKind::Youtube
            } else {
                ContentKind::File
            };
            let mut draft = console.new_draft(kind);
            draft.title = title;
            fields.apply(&mut draft, &tree)?;

            let item = content.submit(&draft).await?;
            output_success(
                &output_format,
                &format!("Submitted '{}' ({}), pending approval", item.title, item.id),
                Some(json!({ "id": item.id, "status": item.status })),
            )
        }
        ContentCommands::Edit { id, title, fields } => {
            let tree = console.tree().fetch_tree().await?;
            let item = content.get(&id).await?;
            let mut draft = ContentDraft::from_item(&item);
            if let Some(title) = title {
                draft.title = title;
            }
            fields.apply(&mut draft, &tree)?;

            let updated = content.edit(&item, &draft).await?;
            output_success(
                &output_format,
                &format!("Updated '{}' ({}), now {}", updated.title, updated.id, updated.status),
                Some(json!({ "id": updated.id, "status": updated.status })),
            )
        }
        ContentCommands::Approve { id } => {
            let item = content.get(&id).await?;
            let approved = content.approve(&item).await?;
            output_success(
                &output_format,
                &format!("Approved '{}'", approved.title),
                Some(json!({ "id": approved.id, "status": approved.status })),
            )
        }
        ContentCommands::Delete { id, yes } => {
            let item = content.get(&id).await?;
            if !yes {
                return Err(anyhow::anyhow!(
                    "Refusing to delete {} '{}' ({}) without --yes",
                    item.status,
                    item.title,
                    item.id
                ));
            }
            content.delete(confirm_delete(&item)).await?;
            output_success(&output_format, &format!("Deleted '{}'", item.title), Some(json!({ "id": item.id })))
        }
        ContentCommands::Stats => {
            let stats = content.stats().await?;
            let text = vec![
                format!("Total:    {}", stats.total),
                format!("Pending:  {}", stats.pending),
                format!("Approved: {}", stats.approved),
            ];
            output_data(&output_format, &serde_json::to_value(stats)?, &text)
        }
    }
}
