use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;

use crate::api::{AdminApi, Committed};
use crate::content::approval::ApprovalStatus;
use crate::content::model::{ContentItem, ContentPage, ContentPayload, ContentQuery, ContentStats, StoredFile};
use crate::content::validate::{Submission, UploadPayload};
use crate::error::{AdminError, AdminResult};
use crate::taxonomy::model::{Grade, Section, Topic};
use crate::taxonomy::mutation::{NodePayload, NodeRecord};
use crate::types::NodeKind;

#[derive(Default)]
struct FakeState {
    grades: Vec<Grade>,
    content: BTreeMap<String, ContentItem>,
    tree_failure: Option<AdminError>,
    mutation_failure: Option<AdminError>,
    tree_delays: VecDeque<Duration>,
    reply_override: Option<Value>,
    next_id: u64,
}

/// In-memory stand-in for the platform.
///
/// Enforces sibling slug uniqueness, parent existence and the has-children
/// delete conflict. Node updates may move a node to another parent.
#[derive(Default)]
pub struct FakeAdminApi {
    state: Mutex<FakeState>,
    tree_fetches: AtomicUsize,
    list_calls: AtomicUsize,
    mutation_calls: AtomicUsize,
}

impl FakeAdminApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_grades(grades: Vec<Grade>) -> Self {
        let api = Self::new();
        api.state().grades = grades;
        api
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    pub fn tree_fetches(&self) -> usize {
        self.tree_fetches.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    pub fn fail_next_tree_fetch(&self, err: AdminError) {
        self.state().tree_failure = Some(err);
    }

    pub fn fail_next_mutation(&self, err: AdminError) {
        self.state().mutation_failure = Some(err);
    }

    /// Commit the next write normally but reply with this body instead of the echo
    pub fn reply_next_write_with(&self, body: Value) {
        self.state().reply_override = Some(body);
    }

    /// Per-call delays for upcoming tree fetches, in call order
    pub fn delay_tree_fetches(&self, delays: Vec<Duration>) {
        self.state().tree_delays = delays.into();
    }

    /// Change the remote tree behind the client's back
    pub fn insert_grade(&self, grade: Grade) {
        self.state().grades.push(grade);
    }

    pub fn insert_content(&self, item: ContentItem) {
        self.state().content.insert(item.id.clone(), item);
    }

    fn begin_mutation(&self) -> AdminResult<MutexGuard<'_, FakeState>> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        match state.mutation_failure.take() {
            Some(err) => Err(err),
            None => Ok(state),
        }
    }
}

impl FakeState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn grade_mut(&mut self, id: &str) -> AdminResult<&mut Grade> {
        self.grades
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or_else(|| AdminError::not_found(format!("Grade '{}' not found", id)))
    }

    fn topic_mut(&mut self, id: &str) -> AdminResult<&mut Topic> {
        self.grades
            .iter_mut()
            .flat_map(|g| g.topics.iter_mut())
            .find(|t| t.id == id)
            .ok_or_else(|| AdminError::not_found(format!("Topic '{}' not found", id)))
    }

    fn take_topic(&mut self, id: &str) -> AdminResult<Topic> {
        for grade in &mut self.grades {
            if let Some(pos) = grade.topics.iter().position(|t| t.id == id) {
                return Ok(grade.topics.remove(pos));
            }
        }
        Err(AdminError::not_found(format!("Topic '{}' not found", id)))
    }

    fn take_section(&mut self, id: &str) -> AdminResult<Section> {
        for topic in self.grades.iter_mut().flat_map(|g| g.topics.iter_mut()) {
            if let Some(pos) = topic.sections.iter().position(|s| s.id == id) {
                return Ok(topic.sections.remove(pos));
            }
        }
        Err(AdminError::not_found(format!("Section '{}' not found", id)))
    }

    /// The echoed record, unless a test asked for a different reply
    fn reply<T: serde::Serialize>(&mut self, echoed: &T) -> AdminResult<Committed> {
        match self.reply_override.take() {
            Some(body) => Ok(Committed::new(body)),
            None => Committed::echo(echoed),
        }
    }

    fn section_mut(&mut self, id: &str) -> AdminResult<&mut Section> {
        self.grades
            .iter_mut()
            .flat_map(|g| g.topics.iter_mut())
            .flat_map(|t| t.sections.iter_mut())
            .find(|s| s.id == id)
            .ok_or_else(|| AdminError::not_found(format!("Section '{}' not found", id)))
    }
}

fn slug_taken<'a>(mut slugs: impl Iterator<Item = (&'a str, &'a str)>, slug: &str, except: Option<&str>) -> bool {
    slugs.any(|(id, s)| s == slug && Some(id) != except)
}

fn duplicate_slug(slug: &str) -> AdminError {
    AdminError::conflict(format!("Slug '{}' already exists", slug))
}

fn parent(payload: &NodePayload, kind: NodeKind) -> AdminResult<String> {
    let parent = match kind {
        NodeKind::Topic => payload.grade_id.clone(),
        _ => payload.topic_id.clone(),
    };
    parent.ok_or_else(|| AdminError::field(kind.parent_field().unwrap_or("parent"), "parent is required"))
}

fn record(id: &str, payload: &NodePayload) -> NodeRecord {
    NodeRecord {
        id: id.to_string(),
        name: payload.name.clone(),
        slug: payload.slug.clone(),
        order: payload.order,
    }
}

fn stored_payload(payload: &UploadPayload, existing: Option<&ContentPayload>) -> AdminResult<ContentPayload> {
    match (payload, existing) {
        (UploadPayload::File(file), _) => Ok(ContentPayload::File(StoredFile {
            file_name: file.file_name.clone(),
            file_size: file.size(),
            mime_category: file.mime.split('/').last().unwrap_or("other").to_string(),
            url: Some(format!("/uploads/{}", file.file_name)),
        })),
        (UploadPayload::Video { url, video_id }, _) => Ok(ContentPayload::ExternalVideo {
            url: url.clone(),
            video_id: video_id.clone(),
        }),
        (UploadPayload::KeepExisting, Some(existing)) => Ok(existing.clone()),
        (UploadPayload::KeepExisting, None) => Err(AdminError::field("file", "A file is required")),
    }
}

#[async_trait]
impl AdminApi for FakeAdminApi {
    async fn fetch_tree(&self) -> AdminResult<Vec<Grade>> {
        self.tree_fetches.fetch_add(1, Ordering::SeqCst);
        let (snapshot, delay) = {
            let mut state = self.state();
            if let Some(err) = state.tree_failure.take() {
                return Err(err);
            }
            (state.grades.clone(), state.tree_delays.pop_front())
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(snapshot)
    }

    async fn create_node(&self, kind: NodeKind, payload: &NodePayload) -> AdminResult<Committed> {
        let mut state = self.begin_mutation()?;
        let id = state.next_id(kind.label());
        match kind {
            NodeKind::Grade => {
                if slug_taken(state.grades.iter().map(|g| (g.id.as_str(), g.slug.as_str())), &payload.slug, None) {
                    return Err(duplicate_slug(&payload.slug));
                }
                state.grades.push(Grade {
                    id: id.clone(),
                    name: payload.name.clone(),
                    slug: payload.slug.clone(),
                    order: payload.order,
                    topics: Vec::new(),
                });
            }
            NodeKind::Topic => {
                let grade_id = parent(payload, kind)?;
                let grade = state.grade_mut(&grade_id)?;
                if slug_taken(grade.topics.iter().map(|t| (t.id.as_str(), t.slug.as_str())), &payload.slug, None) {
                    return Err(duplicate_slug(&payload.slug));
                }
                grade.topics.push(Topic {
                    id: id.clone(),
                    grade_id,
                    name: payload.name.clone(),
                    slug: payload.slug.clone(),
                    order: payload.order,
                    sections: Vec::new(),
                });
            }
            NodeKind::Section => {
                let topic_id = parent(payload, kind)?;
                let topic = state.topic_mut(&topic_id)?;
                if slug_taken(topic.sections.iter().map(|s| (s.id.as_str(), s.slug.as_str())), &payload.slug, None) {
                    return Err(duplicate_slug(&payload.slug));
                }
                topic.sections.push(Section {
                    id: id.clone(),
                    topic_id,
                    name: payload.name.clone(),
                    slug: payload.slug.clone(),
                    order: payload.order,
                });
            }
        }
        state.reply(&record(&id, payload))
    }

    async fn update_node(&self, kind: NodeKind, id: &str, payload: &NodePayload) -> AdminResult<Committed> {
        let mut state = self.begin_mutation()?;
        match kind {
            NodeKind::Grade => {
                let taken = slug_taken(
                    state.grades.iter().map(|g| (g.id.as_str(), g.slug.as_str())),
                    &payload.slug,
                    Some(id),
                );
                if taken {
                    return Err(duplicate_slug(&payload.slug));
                }
                let grade = state.grade_mut(id)?;
                grade.name = payload.name.clone();
                grade.slug = payload.slug.clone();
                grade.order = payload.order;
            }
            NodeKind::Topic => {
                let grade_id = parent(payload, kind)?;
                state.topic_mut(id)?;
                let target = state.grade_mut(&grade_id)?;
                if slug_taken(target.topics.iter().map(|t| (t.id.as_str(), t.slug.as_str())), &payload.slug, Some(id)) {
                    return Err(duplicate_slug(&payload.slug));
                }
                let mut topic = state.take_topic(id)?;
                topic.grade_id = grade_id.clone();
                topic.name = payload.name.clone();
                topic.slug = payload.slug.clone();
                topic.order = payload.order;
                state.grade_mut(&grade_id)?.topics.push(topic);
            }
            NodeKind::Section => {
                let topic_id = parent(payload, kind)?;
                state.section_mut(id)?;
                let target = state.topic_mut(&topic_id)?;
                if slug_taken(target.sections.iter().map(|s| (s.id.as_str(), s.slug.as_str())), &payload.slug, Some(id)) {
                    return Err(duplicate_slug(&payload.slug));
                }
                let mut section = state.take_section(id)?;
                section.topic_id = topic_id.clone();
                section.name = payload.name.clone();
                section.slug = payload.slug.clone();
                section.order = payload.order;
                state.topic_mut(&topic_id)?.sections.push(section);
            }
        }
        state.reply(&record(id, payload))
    }

    async fn delete_node(&self, kind: NodeKind, id: &str) -> AdminResult<()> {
        let mut state = self.begin_mutation()?;
        let has_children = match kind {
            NodeKind::Grade => !state.grade_mut(id)?.topics.is_empty(),
            NodeKind::Topic => !state.topic_mut(id)?.sections.is_empty(),
            NodeKind::Section => {
                state.section_mut(id)?;
                false
            }
        };
        if has_children {
            return Err(AdminError::conflict(format!("{} '{}' still has children", kind, id)));
        }

        match kind {
            NodeKind::Grade => state.grades.retain(|g| g.id != id),
            NodeKind::Topic => state.grades.iter_mut().for_each(|g| g.topics.retain(|t| t.id != id)),
            NodeKind::Section => state
                .grades
                .iter_mut()
                .flat_map(|g| g.topics.iter_mut())
                .for_each(|t| t.sections.retain(|s| s.id != id)),
        }
        Ok(())
    }

    async fn list_content(&self, query: &ContentQuery) -> AdminResult<ContentPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let state = self.state();
        let search = query.search.as_deref().map(str::to_lowercase);
        let matches: Vec<ContentItem> = state
            .content
            .values()
            .filter(|i| query.status.map_or(true, |s| i.status == s))
            .filter(|i| query.grade_id.as_ref().map_or(true, |g| &i.classification.grade_id == g))
            .filter(|i| query.topic_id.as_ref().map_or(true, |t| &i.classification.topic_id == t))
            .filter(|i| query.section_id.as_ref().map_or(true, |s| &i.classification.section_id == s))
            .filter(|i| search.as_ref().map_or(true, |q| i.title.to_lowercase().contains(q)))
            .cloned()
            .collect();

        let page = query.page.unwrap_or(1).max(1);
        let per_page = query.per_page.unwrap_or(20).max(1);
        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(((page - 1) * per_page) as usize)
            .take(per_page as usize)
            .collect();
        Ok(ContentPage {
            items,
            total,
            page,
            per_page,
        })
    }

    async fn get_content(&self, id: &str) -> AdminResult<ContentItem> {
        self.state()
            .content
            .get(id)
            .cloned()
            .ok_or_else(|| AdminError::not_found(format!("Content '{}' not found", id)))
    }

    async fn content_stats(&self) -> AdminResult<ContentStats> {
        let state = self.state();
        let approved = state.content.values().filter(|i| i.status.is_approved()).count() as u64;
        let total = state.content.len() as u64;
        Ok(ContentStats {
            total,
            pending: total - approved,
            approved,
        })
    }

    async fn create_content(&self, submission: &Submission) -> AdminResult<Committed> {
        let mut state = self.begin_mutation()?;
        let id = state.next_id("content");
        let item = ContentItem {
            id: id.clone(),
            title: submission.title.clone(),
            description: submission.description.clone(),
            classification: submission.classification.clone(),
            payload: stored_payload(&submission.payload, None)?,
            banner_url: submission.banner.as_ref().map(|b| format!("/uploads/{}", b.file_name)),
            tags: submission.tags.iter().cloned().collect(),
            status: ApprovalStatus::Pending,
            author_id: Some("admin".to_string()),
            created_at: Some(Utc::now()),
            updated_at: None,
            views: 0,
            downloads: 0,
        };
        state.content.insert(id, item.clone());
        state.reply(&item)
    }

    async fn update_content(&self, id: &str, submission: &Submission) -> AdminResult<Committed> {
        let mut state = self.begin_mutation()?;
        let item = state
            .content
            .get_mut(id)
            .ok_or_else(|| AdminError::not_found(format!("Content '{}' not found", id)))?;

        item.payload = stored_payload(&submission.payload, Some(&item.payload))?;
        item.title = submission.title.clone();
        item.description = submission.description.clone();
        item.classification = submission.classification.clone();
        item.tags = submission.tags.iter().cloned().collect();
        if let Some(banner) = &submission.banner {
            item.banner_url = Some(format!("/uploads/{}", banner.file_name));
        }
        if submission.reset_approval {
            item.status = ApprovalStatus::Pending;
        }
        item.updated_at = Some(Utc::now());
        let updated = item.clone();
        state.reply(&updated)
    }

    async fn approve_content(&self, id: &str) -> AdminResult<()> {
        let mut state = self.begin_mutation()?;
        let item = state
            .content
            .get_mut(id)
            .ok_or_else(|| AdminError::not_found(format!("Content '{}' not found", id)))?;
        item.status = ApprovalStatus::Approved;
        Ok(())
    }

    async fn delete_content(&self, id: &str) -> AdminResult<()> {
        let mut state = self.begin_mutation()?;
        state
            .content
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AdminError::not_found(format!("Content '{}' not found", id)))
    }
}
