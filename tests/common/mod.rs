#![allow(dead_code)]

use std::sync::Arc;

use anyhow::Result;
use serde_json::{json, Value};
use wiremock::MockServer;

use courseware_admin::api::{HttpAdminApi, StaticToken};
use courseware_admin::config::AppConfig;
use courseware_admin::AdminConsole;

pub const TOKEN: &str = "test-token";

/// Development defaults pointed at the mock server
pub fn config_for(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.api.base_url = server.uri();
    config
}

pub fn api_for(server: &MockServer, token: Arc<StaticToken>) -> Result<HttpAdminApi> {
    Ok(HttpAdminApi::new(&config_for(server).api, token)?)
}

pub fn console_for(server: &MockServer) -> Result<AdminConsole> {
    let token = Arc::new(StaticToken::new(Some(TOKEN.to_string())));
    Ok(AdminConsole::with_http(&config_for(server), token)?)
}

pub fn envelope(data: Value) -> Value {
    json!({ "success": true, "data": data })
}

pub fn failure(error: &str) -> Value {
    json!({ "success": false, "error": error })
}

/// Deliberately out of order, with parent ids omitted and one string order
pub fn tree_json() -> Value {
    json!([
        {
            "id": "g11", "name": "Lớp 11", "slug": "lop-11", "order": 2,
            "topics": []
        },
        {
            "id": "g10", "name": "Lớp 10", "slug": "lop-10", "order": 1,
            "topics": [
                {
                    "id": "t2", "name": "Chủ đề 2", "slug": "chu-de-2", "order": "5",
                    "sections": []
                },
                {
                    "id": "t1", "name": "Chủ đề 1", "slug": "chu-de-1", "order": 1,
                    "sections": [
                        { "id": "s1", "name": "Mục A", "slug": "muc-a", "order": 1 },
                        { "id": "s2", "name": "Mục B", "slug": "muc-b", "order": 2 }
                    ]
                }
            ]
        }
    ])
}

pub fn file_item_json(id: &str, approved: bool) -> Value {
    json!({
        "id": id,
        "title": "Đề cương ôn tập",
        "description": "<p>Chương 1</p>",
        "grade_id": "g10",
        "topic_id": "t1",
        "section_id": "s1",
        "content_type": "file",
        "file_url": "/uploads/de-cuong.pdf",
        "file_name": "de-cuong.pdf",
        "file_size": 2048,
        "file_type": "pdf",
        "tags": ["toán"],
        "is_approved": approved,
        "created_at": "2024-03-01T08:00:00Z",
        "views": 3,
        "downloads": 1
    })
}

pub fn video_item_json(id: &str, approved: bool) -> Value {
    json!({
        "id": id,
        "title": "Bài giảng video",
        "grade_id": "g10",
        "topic_id": "t1",
        "section_id": "s2",
        "content_type": "youtube",
        "youtube_url": "https://youtu.be/dQw4w9WgXcQ",
        "youtube_id": "dQw4w9WgXcQ",
        "is_approved": approved
    })
}

pub fn page_json(items: Vec<Value>) -> Value {
    let total = items.len();
    json!({ "items": items, "total": total, "page": 1, "per_page": 20 })
}
