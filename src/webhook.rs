//! Webhook payload structures
//!
//! Mirrors the pull-request hook body sent by the code-hosting platform.
//! Only `hook_name`, `pull_request.merged` and `pull_request.base.repo.full_name`
//! drive dispatch; the rest is decoded so that real payloads parse, but is
//! otherwise unused. Every field falls back to its default when absent or `null`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// `hook_name` value identifying a merge/pull-request event
pub const PULL_REQUEST_HOOK_NAME: &str = "merge_request_hooks";

/// Treats an explicit `null` like an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HookEvent {
    #[serde(deserialize_with = "null_as_default")]
    pub hook_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub password: String,
    #[serde(deserialize_with = "null_as_default")]
    pub hook_id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub hook_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub timestamp: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sign: String,
    #[serde(deserialize_with = "null_as_default")]
    pub pull_request: PullRequest,
    #[serde(deserialize_with = "null_as_default")]
    pub author: User,
    #[serde(deserialize_with = "null_as_default")]
    pub sender: User,
    #[serde(deserialize_with = "null_as_default")]
    pub enterprise: Enterprise,
}

impl HookEvent {
    /// Returns true if this payload was sent by a merge-request hook.
    pub fn is_pull_request_hook(&self) -> bool {
        self.hook_name == PULL_REQUEST_HOOK_NAME
    }

    /// Full name of the repository the pull request targets.
    pub fn project_name(&self) -> &str {
        &self.pull_request.base.repo.full_name
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PullRequest {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub number: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub state: String,
    #[serde(deserialize_with = "null_as_default")]
    pub html_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub diff_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub patch_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub body: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub merge_commit_sha: String,
    #[serde(deserialize_with = "null_as_default")]
    pub user: User,
    pub assignee: Option<User>,
    pub tester: Value,
    pub milestone: Option<Milestone>,
    #[serde(deserialize_with = "null_as_default")]
    pub head: Branch,
    #[serde(deserialize_with = "null_as_default")]
    pub base: Branch,
    #[serde(deserialize_with = "null_as_default")]
    pub merged: bool,
    pub mergeable: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub comments: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub commits: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub additions: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub deletions: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub changed_files: i64,
}

/// Head or base side of a pull request
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Branch {
    #[serde(deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(rename = "ref", deserialize_with = "null_as_default")]
    pub reference: String,
    #[serde(deserialize_with = "null_as_default")]
    pub sha: String,
    #[serde(deserialize_with = "null_as_default")]
    pub user: User,
    #[serde(deserialize_with = "null_as_default")]
    pub repo: Repository,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Repository {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub path: String,
    #[serde(deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub owner: User,
    #[serde(deserialize_with = "null_as_default")]
    pub private: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub html_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
    pub description: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub fork: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default")]
    pub git_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub ssh_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub clone_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub git_http_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub git_ssh_url: String,
    pub homepage: Value,
    pub language: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub default_branch: String,
    #[serde(deserialize_with = "null_as_default")]
    pub namespace: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name_with_namespace: String,
    #[serde(deserialize_with = "null_as_default")]
    pub path_with_namespace: String,
}

/// Author, sender, owner, assignee and pull request user all share this shape
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct User {
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub login: String,
    #[serde(deserialize_with = "null_as_default")]
    pub avatar_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub html_url: String,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(deserialize_with = "null_as_default")]
    pub site_admin: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(deserialize_with = "null_as_default")]
    pub user_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Milestone {
    #[serde(deserialize_with = "null_as_default")]
    pub html_url: String,
    #[serde(deserialize_with = "null_as_default")]
    pub id: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub number: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub title: String,
    pub description: Value,
    #[serde(deserialize_with = "null_as_default")]
    pub open_issues: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub started_issues: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub closed_issues: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub approved_issues: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub state: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub due_on: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Enterprise {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_merged_pull_request_payload() {
        let body = json!({
            "hook_name": "merge_request_hooks",
            "hook_id": 42,
            "sign": "abc",
            "timestamp": "1576754827988",
            "pull_request": {
                "number": 7,
                "state": "merged",
                "merged": true,
                "created_at": "2024-03-01T10:00:00+08:00",
                "milestone": null,
                "assignee": null,
                "base": {
                    "ref": "master",
                    "repo": { "full_name": "acme/widgets" }
                }
            },
            "sender": { "login": "octo", "type": "User" },
            "unknown_field": [1, 2, 3]
        });

        let event: HookEvent = serde_json::from_value(body).unwrap();
        assert!(event.is_pull_request_hook());
        assert!(event.pull_request.merged);
        assert_eq!(event.project_name(), "acme/widgets");
        assert_eq!(event.pull_request.base.reference, "master");
        assert_eq!(event.sender.kind, "User");
        assert!(event.pull_request.milestone.is_none());
    }

    #[test]
    fn empty_object_decodes_to_defaults() {
        let event: HookEvent = serde_json::from_str("{}").unwrap();
        assert_eq!(event.hook_name, "");
        assert!(!event.is_pull_request_hook());
        assert!(!event.pull_request.merged);
    }

    #[test]
    fn null_fields_decode_to_defaults() {
        let body = r#"{
            "hook_name": "merge_request_hooks",
            "hook_id": null,
            "enterprise": null,
            "author": null,
            "pull_request": {
                "merged": false,
                "merge_commit_sha": null,
                "comments": null,
                "user": null,
                "head": { "repo": null },
                "base": { "ref": null, "repo": { "full_name": "acme/widgets", "owner": null } }
            }
        }"#;

        let event: HookEvent = serde_json::from_str(body).unwrap();
        assert!(event.is_pull_request_hook());
        assert!(!event.pull_request.merged);
        assert_eq!(event.hook_id, 0);
        assert_eq!(event.enterprise.name, "");
        assert_eq!(event.pull_request.merge_commit_sha, "");
        assert_eq!(event.pull_request.base.reference, "");
        assert_eq!(event.project_name(), "acme/widgets");
    }

    #[test]
    fn mismatched_field_type_is_rejected() {
        let result = serde_json::from_str::<HookEvent>(r#"{"pull_request": {"merged": "yes"}}"#);
        assert!(result.is_err());
    }
}
