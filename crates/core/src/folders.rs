//! Folder store and path resolution.
//!
//! Folders form a forest per vault scope, stored as parent-pointer rows.
//! Resolution loads the whole scope once, builds a full-path map, then walks
//! the requested segments left to right, lazily creating whatever is missing.
//!
//! Concurrent calls creating the same new path are not coordinated; two
//! simultaneous requests can each insert their own copy. Known race, kept
//! as-is (no locking, no transaction) to match the deployed behavior.

use crate::models::{MatchType, SmartMatch, TargetFolder, VaultScope};
use anyhow::{bail, Context};
use chrono::Utc;
use sqlx::SqlitePool;
use std::collections::HashMap;
use storage::models::FolderRow;
use tracing::debug;
use uuid::Uuid;

/// Alternate spellings for the canonical folder names.
///
/// Defined for the smart matcher but not consulted by it yet; only exact
/// path matching is implemented. Kept because the portal ships the table to
/// the folder-suggestion UI.
pub const FOLDER_ALIASES: &[(&str, &[&str])] = &[
    (
        "Driver Licenses",
        &["Driver License", "Drivers License", "Driver's License", "DL"],
    ),
    ("Passports", &["Passport"]),
    ("ID Cards", &["ID Card", "Identification Cards"]),
    ("Bank Statements", &["Bank Statement", "Account Statements"]),
    ("Tax Documents", &["Tax Document", "Taxes", "Tax Returns"]),
    ("Medical Records", &["Medical Record", "Health Records"]),
    ("Contracts", &["Contract", "Agreements"]),
    ("Receipts", &["Receipt"]),
];

#[derive(Clone)]
pub struct FolderService {
    pool: SqlitePool,
}

impl FolderService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Resolve `segments` to a leaf folder, creating any missing nodes.
    ///
    /// The returned `path_segments` always equal the input; `created` is true
    /// when at least one node was inserted. Errors on an empty segment list.
    pub async fn get_or_create_folder_path(
        &self,
        segments: &[String],
        scope: &VaultScope,
    ) -> anyhow::Result<TargetFolder> {
        if segments.is_empty() {
            bail!("folder path cannot be empty");
        }

        let existing = self.fetch_all_folders(scope).await?;
        let mut by_path = build_path_map(&existing);

        let mut parent_id: Option<String> = None;
        let mut created_any = false;

        for i in 0..segments.len() {
            let prefix = segments[..=i].join("/");
            if let Some(folder) = by_path.get(&prefix) {
                parent_id = Some(folder.id.clone());
            } else {
                let folder = self
                    .create_folder(&segments[i], parent_id.as_deref(), scope)
                    .await?;
                parent_id = Some(folder.id.clone());
                created_any = true;
                // Later siblings in this same call must see the new node.
                by_path.insert(prefix, folder);
            }
        }

        let path = segments.join("/");
        let leaf = by_path
            .get(&path)
            .context("resolved leaf folder missing from path map")?;

        Ok(TargetFolder {
            id: leaf.id.clone(),
            name: leaf.name.clone(),
            path,
            path_segments: segments.to_vec(),
            created: created_any,
        })
    }

    /// Check whether a full path already exists; returns the leaf id if so.
    pub async fn folder_path_exists(
        &self,
        segments: &[String],
        scope: &VaultScope,
    ) -> anyhow::Result<Option<String>> {
        let existing = self.fetch_all_folders(scope).await?;
        let by_path = build_path_map(&existing);
        Ok(by_path.get(&segments.join("/")).map(|f| f.id.clone()))
    }

    pub async fn folder_by_id(&self, folder_id: &str) -> anyhow::Result<Option<FolderRow>> {
        let folder = sqlx::query_as::<_, FolderRow>("SELECT * FROM folders WHERE id = ?")
            .bind(folder_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(folder)
    }

    /// Ancestor names root-first, ending with the folder itself.
    pub async fn folder_path(&self, folder_id: &str) -> anyhow::Result<Vec<String>> {
        let mut names = Vec::new();
        let mut current = Some(folder_id.to_string());

        while let Some(id) = current {
            let Some(folder) = self.folder_by_id(&id).await? else {
                break;
            };
            names.insert(0, folder.name);
            current = folder.parent_id;
        }
        Ok(names)
    }

    /// Try to reuse an existing folder for a suggested path.
    ///
    /// Only exact case-insensitive full-path matching is implemented;
    /// confidence is therefore binary.
    pub async fn find_best_matching_folder(
        &self,
        suggested: &[String],
        scope: &VaultScope,
    ) -> anyhow::Result<SmartMatch> {
        let existing = self.fetch_all_folders(scope).await?;
        if existing.is_empty() {
            return Ok(SmartMatch {
                matched: false,
                match_type: MatchType::None,
                folder_id: None,
                folder_path: None,
                confidence: 0.0,
                create_path: Some(suggested.to_vec()),
            });
        }

        let target = suggested.join("/").to_lowercase();
        let by_id: HashMap<&str, &FolderRow> =
            existing.iter().map(|f| (f.id.as_str(), f)).collect();

        for folder in &existing {
            let path = full_path(folder, &by_id);
            if path.to_lowercase() == target {
                return Ok(SmartMatch {
                    matched: true,
                    match_type: MatchType::Exact,
                    folder_id: Some(folder.id.clone()),
                    folder_path: Some(path),
                    confidence: 1.0,
                    create_path: None,
                });
            }
        }

        Ok(SmartMatch {
            matched: false,
            match_type: MatchType::None,
            folder_id: None,
            folder_path: None,
            confidence: 0.0,
            create_path: Some(suggested.to_vec()),
        })
    }

    /// Reuse a matching folder when one exists, otherwise create the path.
    pub async fn smart_get_or_create(
        &self,
        suggested: &[String],
        scope: &VaultScope,
    ) -> anyhow::Result<(TargetFolder, SmartMatch)> {
        let matched = self.find_best_matching_folder(suggested, scope).await?;

        if matched.matched {
            if let Some(folder_id) = &matched.folder_id {
                if let Some(folder) = self.folder_by_id(folder_id).await? {
                    let path = matched
                        .folder_path
                        .clone()
                        .unwrap_or_else(|| folder.name.clone());
                    let segments: Vec<String> = path.split('/').map(str::to_string).collect();
                    return Ok((
                        TargetFolder {
                            id: folder.id,
                            name: folder.name,
                            path,
                            path_segments: segments,
                            created: false,
                        },
                        matched,
                    ));
                }
            }
        }

        let create_path = matched.create_path.clone().unwrap_or_else(|| suggested.to_vec());
        let folder = self.get_or_create_folder_path(&create_path, scope).await?;
        Ok((
            folder,
            SmartMatch {
                matched: false,
                match_type: MatchType::None,
                ..matched
            },
        ))
    }

    async fn fetch_all_folders(&self, scope: &VaultScope) -> anyhow::Result<Vec<FolderRow>> {
        let rows = match scope {
            VaultScope::Personal { personal_vault_id } => {
                sqlx::query_as::<_, FolderRow>(
                    "SELECT * FROM folders WHERE personal_vault_id = ?",
                )
                .bind(personal_vault_id)
                .fetch_all(&self.pool)
                .await?
            }
            VaultScope::Organization { organization_id } => {
                sqlx::query_as::<_, FolderRow>("SELECT * FROM folders WHERE organization_id = ?")
                    .bind(organization_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }

    async fn create_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
        scope: &VaultScope,
    ) -> anyhow::Result<FolderRow> {
        // The folders table has no id default; generate in code.
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO folders (id, name, parent_id, personal_vault_id, organization_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(name)
        .bind(parent_id)
        .bind(scope.personal_vault_id())
        .bind(scope.organization_id())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .with_context(|| format!("create folder {name:?}"))?;

        debug!(folder = name, parent = ?parent_id, "created folder");

        Ok(FolderRow {
            id,
            name: name.to_string(),
            parent_id: parent_id.map(str::to_string),
            personal_vault_id: scope.personal_vault_id().map(str::to_string),
            organization_id: scope.organization_id().map(str::to_string),
            created_at: now.clone(),
            updated_at: now,
        })
    }
}

fn build_path_map(folders: &[FolderRow]) -> HashMap<String, FolderRow> {
    let by_id: HashMap<&str, &FolderRow> = folders.iter().map(|f| (f.id.as_str(), f)).collect();
    folders
        .iter()
        .map(|f| (full_path(f, &by_id), f.clone()))
        .collect()
}

/// Join a folder's ancestor chain into a `/`-separated path. Chains are
/// short in practice; a broken parent pointer just truncates the prefix.
fn full_path(folder: &FolderRow, by_id: &HashMap<&str, &FolderRow>) -> String {
    let mut parts = vec![folder.name.clone()];
    let mut current = folder;
    while let Some(parent_id) = &current.parent_id {
        let Some(parent) = by_id.get(parent_id.as_str()) else {
            break;
        };
        parts.insert(0, parent.name.clone());
        current = parent;
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = storage::connect("sqlite::memory:").await.unwrap();
        storage::migrate(&pool).await.unwrap();
        pool
    }

    fn segs(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_path_is_rejected() {
        let svc = FolderService::new(test_pool().await);
        let scope = VaultScope::personal("pv1");
        assert!(svc.get_or_create_folder_path(&[], &scope).await.is_err());
    }

    #[tokio::test]
    async fn creates_parent_then_child_on_empty_scope() {
        let pool = test_pool().await;
        let svc = FolderService::new(pool.clone());
        let scope = VaultScope::personal("pv1");

        let target = svc
            .get_or_create_folder_path(&segs(&["Tax Documents", "2024"]), &scope)
            .await
            .unwrap();

        assert_eq!(target.path, "Tax Documents/2024");
        assert_eq!(target.name, "2024");
        assert!(target.created);
        assert_eq!(target.path_segments.join("/"), target.path);

        let rows = sqlx::query_as::<_, FolderRow>("SELECT * FROM folders ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        let child = rows.iter().find(|r| r.name == "2024").unwrap();
        let parent = rows.iter().find(|r| r.name == "Tax Documents").unwrap();
        assert_eq!(child.parent_id.as_deref(), Some(parent.id.as_str()));
        assert!(parent.parent_id.is_none());
    }

    #[tokio::test]
    async fn resolution_is_idempotent_after_first_creation() {
        let svc = FolderService::new(test_pool().await);
        let scope = VaultScope::personal("pv1");
        let path = segs(&["Personal Documents", "Identity", "2026", "Passports"]);

        let first = svc.get_or_create_folder_path(&path, &scope).await.unwrap();
        let second = svc.get_or_create_folder_path(&path, &scope).await.unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn sibling_paths_share_the_parent() {
        let pool = test_pool().await;
        let svc = FolderService::new(pool.clone());
        let scope = VaultScope::organization("org1");

        let a = svc
            .get_or_create_folder_path(&segs(&["Expenses", "2025"]), &scope)
            .await
            .unwrap();
        let b = svc
            .get_or_create_folder_path(&segs(&["Expenses", "2026"]), &scope)
            .await
            .unwrap();
        assert_ne!(a.id, b.id);

        let parents: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM folders WHERE name = 'Expenses'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(parents.0, 1);
    }

    #[tokio::test]
    async fn scopes_never_collide() {
        let svc = FolderService::new(test_pool().await);
        let path = segs(&["Receipts"]);

        let personal = svc
            .get_or_create_folder_path(&path, &VaultScope::personal("pv1"))
            .await
            .unwrap();
        let org = svc
            .get_or_create_folder_path(&path, &VaultScope::organization("org1"))
            .await
            .unwrap();

        assert_ne!(personal.id, org.id);
        assert!(org.created);
    }

    #[tokio::test]
    async fn resolver_matching_is_case_sensitive() {
        let svc = FolderService::new(test_pool().await);
        let scope = VaultScope::personal("pv1");

        let upper = svc
            .get_or_create_folder_path(&segs(&["Taxes"]), &scope)
            .await
            .unwrap();
        let lower = svc
            .get_or_create_folder_path(&segs(&["taxes"]), &scope)
            .await
            .unwrap();
        assert_ne!(upper.id, lower.id);
    }

    #[tokio::test]
    async fn smart_match_is_exact_and_case_insensitive() {
        let svc = FolderService::new(test_pool().await);
        let scope = VaultScope::personal("pv1");
        svc.get_or_create_folder_path(&segs(&["Personal Documents", "Identity"]), &scope)
            .await
            .unwrap();

        let hit = svc
            .find_best_matching_folder(&segs(&["personal documents", "IDENTITY"]), &scope)
            .await
            .unwrap();
        assert!(hit.matched);
        assert_eq!(hit.match_type, MatchType::Exact);
        assert_eq!(hit.confidence, 1.0);
        assert!(hit.folder_id.is_some());

        let miss = svc
            .find_best_matching_folder(&segs(&["Personal Documents", "Legal"]), &scope)
            .await
            .unwrap();
        assert!(!miss.matched);
        assert_eq!(miss.match_type, MatchType::None);
        assert_eq!(miss.confidence, 0.0);
        assert_eq!(
            miss.create_path,
            Some(segs(&["Personal Documents", "Legal"]))
        );
    }

    #[tokio::test]
    async fn smart_get_or_create_reuses_then_creates() {
        let svc = FolderService::new(test_pool().await);
        let scope = VaultScope::personal("pv1");
        let existing = svc
            .get_or_create_folder_path(&segs(&["Invoices", "2026"]), &scope)
            .await
            .unwrap();

        let (reused, matched) = svc
            .smart_get_or_create(&segs(&["invoices", "2026"]), &scope)
            .await
            .unwrap();
        assert!(matched.matched);
        assert_eq!(reused.id, existing.id);
        assert!(!reused.created);

        let (fresh, miss) = svc
            .smart_get_or_create(&segs(&["Invoices", "2027"]), &scope)
            .await
            .unwrap();
        assert!(!miss.matched);
        assert!(fresh.created);
    }

    #[tokio::test]
    async fn folder_path_walks_ancestors_root_first() {
        let svc = FolderService::new(test_pool().await);
        let scope = VaultScope::personal("pv1");
        let leaf = svc
            .get_or_create_folder_path(&segs(&["A", "B", "C"]), &scope)
            .await
            .unwrap();

        let names = svc.folder_path(&leaf.id).await.unwrap();
        assert_eq!(names, segs(&["A", "B", "C"]));
    }
}
