//! In-memory store used when no database is configured, and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Store, StoreError, StoreResult};
use crate::models::activity::ActivityLogEntry;
use crate::models::detection::DetectionRecord;
use crate::models::generation::GenerationRecord;
use crate::models::user::User;

pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    detections: RwLock<HashMap<Uuid, DetectionRecord>>,
    generations: RwLock<HashMap<Uuid, GenerationRecord>>,
    activity: RwLock<Vec<ActivityLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            detections: RwLock::new(HashMap::new()),
            generations: RwLock::new(HashMap::new()),
            activity: RwLock::new(Vec::new()),
        }
    }

    /// Number of activity entries written so far.
    #[cfg(test)]
    pub async fn activity_count(&self) -> usize {
        self.activity.read().await.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn eq_ci(a: &Option<String>, b: &str) -> bool {
    a.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(b))
}

/// Name of the unique field `candidate` would clash on, ignoring the user itself.
fn conflicting_field(users: &HashMap<Uuid, User>, candidate: &User) -> Option<&'static str> {
    for other in users.values().filter(|u| u.id != candidate.id) {
        if let Some(name) = &candidate.username {
            if eq_ci(&other.username, name) {
                return Some("username");
            }
        }
        if let Some(email) = &candidate.email {
            if eq_ci(&other.email, email) {
                return Some("email");
            }
        }
        if candidate.uid.is_some() && other.uid == candidate.uid {
            return Some("uid");
        }
    }
    None
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn health(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if let Some(field) = conflicting_field(&users, &user) {
            return Err(StoreError::Duplicate(field.to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| eq_ci(&u.username, login) || eq_ci(&u.email, login))
            .cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| eq_ci(&u.email, email))
            .cloned())
    }

    async fn find_user_by_uid(&self, uid: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.uid.as_deref() == Some(uid))
            .cloned())
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        if !users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        if let Some(field) = conflicting_field(&users, user) {
            return Err(StoreError::Duplicate(field.to_string()));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn insert_detection(&self, record: &DetectionRecord) -> StoreResult<()> {
        self.detections
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn get_detection(&self, id: Uuid) -> StoreResult<Option<DetectionRecord>> {
        Ok(self.detections.read().await.get(&id).cloned())
    }

    async fn list_detections(
        &self,
        user_id: Uuid,
        detection_type: Option<&str>,
    ) -> StoreResult<Vec<DetectionRecord>> {
        let mut items: Vec<DetectionRecord> = self
            .detections
            .read()
            .await
            .values()
            .filter(|r| r.user_id == Some(user_id))
            .filter(|r| detection_type.map_or(true, |t| r.detection_type == t))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn delete_detection(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.detections.write().await.remove(&id).is_some())
    }

    async fn set_detection_pdf(&self, id: Uuid, path: &str, url: &str) -> StoreResult<()> {
        let mut detections = self.detections.write().await;
        let record = detections.get_mut(&id).ok_or(StoreError::NotFound)?;
        record.pdf_path = Some(path.to_string());
        record.pdf_url = Some(url.to_string());
        Ok(())
    }

    async fn insert_generation(&self, record: &GenerationRecord) -> StoreResult<()> {
        self.generations
            .write()
            .await
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn get_generation(&self, id: Uuid) -> StoreResult<Option<GenerationRecord>> {
        Ok(self.generations.read().await.get(&id).cloned())
    }

    async fn list_generations(
        &self,
        user_id: Uuid,
        strategy: Option<&str>,
    ) -> StoreResult<Vec<GenerationRecord>> {
        let mut items: Vec<GenerationRecord> = self
            .generations
            .read()
            .await
            .values()
            .filter(|r| r.user_id == Some(user_id))
            .filter(|r| strategy.map_or(true, |s| r.strategy == s))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn delete_generation(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.generations.write().await.remove(&id).is_some())
    }

    async fn set_generation_pdf(&self, id: Uuid, path: &str, url: &str) -> StoreResult<()> {
        let mut generations = self.generations.write().await;
        let record = generations.get_mut(&id).ok_or(StoreError::NotFound)?;
        record.pdf_path = Some(path.to_string());
        record.pdf_url = Some(url.to_string());
        Ok(())
    }

    async fn insert_activity(&self, entry: &ActivityLogEntry) -> StoreResult<()> {
        self.activity.write().await.push(entry.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    #[tokio::test]
    async fn test_duplicate_email_rejected_case_insensitively() {
        let store = MemoryStore::new();
        store
            .create_user(User::new(Some("alice".into()), Some("alice@example.com".into())))
            .await
            .unwrap();
        let err = store
            .create_user(User::new(Some("bob".into()), Some("ALICE@example.com".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(field) if field == "email"));
    }

    #[tokio::test]
    async fn test_find_by_login_matches_username_or_email() {
        let store = MemoryStore::new();
        let user = store
            .create_user(User::new(Some("alice".into()), Some("alice@example.com".into())))
            .await
            .unwrap();
        let by_name = store.find_user_by_login("Alice").await.unwrap().unwrap();
        let by_mail = store
            .find_user_by_login("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_mail.id, user.id);
        assert!(store.find_user_by_login("carol").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_detections_newest_first_and_filtered() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let mut older = DetectionRecord::new(
            Some(owner),
            "baseline",
            "a".into(),
            None,
            json!({}),
            json!({"prediction": "real"}),
        );
        older.created_at = Utc::now() - Duration::minutes(5);
        let newer = DetectionRecord::new(
            Some(owner),
            "improved",
            "b".into(),
            None,
            json!({}),
            json!({"prediction": "fake"}),
        );
        let foreign = DetectionRecord::new(
            Some(Uuid::new_v4()),
            "improved",
            "c".into(),
            None,
            json!({}),
            json!({}),
        );
        for r in [&older, &newer, &foreign] {
            store.insert_detection(r).await.unwrap();
        }

        let all = store.list_detections(owner, None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, newer.id);

        let improved = store.list_detections(owner, Some("improved")).await.unwrap();
        assert_eq!(improved.len(), 1);
        assert_eq!(improved[0].id, newer.id);
    }

    #[tokio::test]
    async fn test_set_pdf_on_missing_record() {
        let store = MemoryStore::new();
        let err = store
            .set_detection_pdf(Uuid::new_v4(), "p", "u")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
