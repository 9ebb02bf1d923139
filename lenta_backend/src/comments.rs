use crate::database::models::{CommentRecord, CommentWithAuthorRecord};
use crate::database::repositories::{CommentRepository, PostRepository, UserRepository};
use crate::database::Database;
use crate::error::{ServiceError, ServiceResult};
use crate::utils::now_utc;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

const MAX_COMMENT_LENGTH: usize = 5_000;
/// Deepest nesting a reply may have; a top-level comment sits at depth 1.
pub const MAX_REPLY_DEPTH: usize = 256;

#[derive(Clone)]
pub struct CommentService {
    database: Database,
}

impl CommentService {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Adds a top-level comment or, when `parent_id` is set, a reply. The
    /// parent must belong to the same post and sit above [`MAX_REPLY_DEPTH`].
    pub fn add_comment(&self, input: AddCommentInput) -> ServiceResult<CommentView> {
        let body = input.body.trim().to_string();
        if body.is_empty() {
            return Err(ServiceError::validation("comment body may not be empty"));
        }
        if body.chars().count() > MAX_COMMENT_LENGTH {
            return Err(ServiceError::validation(format!(
                "comment body may not exceed {MAX_COMMENT_LENGTH} characters"
            )));
        }

        let record = CommentRecord {
            id: Uuid::new_v4().to_string(),
            post_id: input.post_id.clone(),
            parent_id: input.parent_id.clone(),
            author_id: input.author_id.clone(),
            body,
            created_at: now_utc(),
        };

        let stored = self.database.with_repositories(|repos| {
            if repos.posts().get(&record.post_id)?.is_none() {
                anyhow::bail!(ServiceError::not_found(format!("post {}", record.post_id)));
            }
            if let Some(parent_id) = record.parent_id.as_deref() {
                match repos.comments().get(parent_id)? {
                    Some(parent) if parent.post_id == record.post_id => {
                        let parent_depth = repos
                            .comments()
                            .chain_length(parent_id, MAX_REPLY_DEPTH)?;
                        if parent_depth >= MAX_REPLY_DEPTH {
                            anyhow::bail!(ServiceError::validation(format!(
                                "replies may not nest deeper than {MAX_REPLY_DEPTH} levels"
                            )));
                        }
                    }
                    Some(_) => anyhow::bail!(ServiceError::validation(
                        "parent comment belongs to a different post"
                    )),
                    None => anyhow::bail!(ServiceError::validation(format!(
                        "parent comment {parent_id} does not exist"
                    ))),
                }
            }
            let Some(author) = repos.users().get(&record.author_id)? else {
                anyhow::bail!(ServiceError::not_found(format!("user {}", record.author_id)));
            };
            repos.comments().create(&record)?;
            Ok(CommentWithAuthorRecord {
                comment: record.clone(),
                author_username: author.username,
            })
        })?;

        tracing::info!(
            comment_id = %stored.comment.id,
            post_id = %stored.comment.post_id,
            is_reply = stored.comment.parent_id.is_some(),
            "comment added"
        );
        Ok(CommentView::from_record(stored))
    }

    /// Returns the reply forest for a post.
    pub fn comment_tree(&self, post_id: &str) -> ServiceResult<Vec<CommentNode>> {
        let records = self.database.with_repositories(|repos| {
            if repos.posts().get(post_id)?.is_none() {
                anyhow::bail!(ServiceError::not_found(format!("post {post_id}")));
            }
            repos.comments().list_for_post(post_id)
        })?;
        Ok(build_comment_tree(
            records.into_iter().map(CommentView::from_record).collect(),
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCommentInput {
    pub post_id: String,
    pub author_id: String,
    pub body: String,
    #[serde(default)]
    pub parent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: String,
    pub post_id: String,
    pub parent_id: Option<String>,
    pub author_id: String,
    pub author_username: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl CommentView {
    pub(crate) fn from_record(record: CommentWithAuthorRecord) -> Self {
        let CommentWithAuthorRecord {
            comment,
            author_username,
        } = record;
        Self {
            id: comment.id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            author_id: comment.author_id,
            author_username,
            body: comment.body,
            created_at: comment.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentNode {
    pub comment: CommentView,
    pub replies: Vec<CommentNode>,
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

impl CommentNode {
    /// Number of comments in this subtree, including this one.
    pub fn subtree_size(&self) -> usize {
        1 + self.replies.iter().map(CommentNode::subtree_size).sum::<usize>()
    }
}

/// Turns comments ordered oldest-first into a forest of reply trees.
///
/// Siblings keep their input order. A comment whose parent id does not
/// resolve is left out together with its replies, as is anything caught in a
/// parent cycle. When an id repeats, the first occurrence is used.
pub fn build_comment_tree(comments: Vec<CommentView>) -> Vec<CommentNode> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(comments.len());
    for (position, comment) in comments.iter().enumerate() {
        index.entry(comment.id.as_str()).or_insert(position);
    }

    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); comments.len()];
    for (position, comment) in comments.iter().enumerate() {
        if index.get(comment.id.as_str()) != Some(&position) {
            continue;
        }
        match comment.parent_id.as_deref() {
            None => roots.push(position),
            Some(parent_id) => {
                if let Some(&parent) = index.get(parent_id) {
                    children[parent].push(position);
                }
            }
        }
    }

    // Pre-order walk from the roots; only nodes reachable from a root are
    // visited, and each at most once since every comment has one parent.
    let mut order = Vec::with_capacity(comments.len());
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(position) = stack.pop() {
        order.push(position);
        stack.extend(children[position].iter().rev().copied());
    }

    let mut slots: Vec<Option<CommentView>> = comments.into_iter().map(Some).collect();
    let mut built: Vec<Option<CommentNode>> = (0..slots.len()).map(|_| None).collect();
    for &position in order.iter().rev() {
        let replies = children[position]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        if let Some(comment) = slots[position].take() {
            built[position] = Some(CommentNode { comment, replies });
        }
    }

    roots
        .into_iter()
        .filter_map(|root| built[root].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{PostRecord, UserRecord};
    use chrono::TimeZone;

    fn comment(id: &str, parent: Option<&str>, offset_secs: i64) -> CommentView {
        CommentView {
            id: id.into(),
            post_id: "post".into(),
            parent_id: parent.map(str::to_string),
            author_id: "author".into(),
            author_username: "author".into(),
            body: format!("body of {id}"),
            created_at: Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap(),
        }
    }

    fn ids(nodes: &[CommentNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.comment.id.as_str()).collect()
    }

    fn total(nodes: &[CommentNode]) -> usize {
        nodes.iter().map(CommentNode::subtree_size).sum()
    }

    #[test]
    fn empty_input_builds_empty_forest() {
        assert!(build_comment_tree(Vec::new()).is_empty());
    }

    #[test]
    fn replies_nest_under_parents_in_input_order() {
        let tree = build_comment_tree(vec![
            comment("a", None, 0),
            comment("b", None, 1),
            comment("a1", Some("a"), 2),
            comment("a2", Some("a"), 3),
            comment("a1x", Some("a1"), 4),
            comment("b1", Some("b"), 5),
        ]);

        assert_eq!(ids(&tree), vec!["a", "b"]);
        assert_eq!(ids(&tree[0].replies), vec!["a1", "a2"]);
        assert_eq!(ids(&tree[0].replies[0].replies), vec!["a1x"]);
        assert_eq!(ids(&tree[1].replies), vec!["b1"]);
        assert_eq!(total(&tree), 6);
    }

    #[test]
    fn reply_listed_before_its_parent_is_still_attached() {
        let tree = build_comment_tree(vec![
            comment("child", Some("root"), 0),
            comment("root", None, 1),
        ]);
        assert_eq!(ids(&tree), vec!["root"]);
        assert_eq!(ids(&tree[0].replies), vec!["child"]);
    }

    #[test]
    fn dangling_parent_drops_comment_and_its_replies() {
        let tree = build_comment_tree(vec![
            comment("root", None, 0),
            comment("orphan", Some("deleted"), 1),
            comment("orphan-reply", Some("orphan"), 2),
            comment("reply", Some("root"), 3),
        ]);

        assert_eq!(ids(&tree), vec!["root"]);
        assert_eq!(ids(&tree[0].replies), vec!["reply"]);
        assert_eq!(total(&tree), 2);
    }

    #[test]
    fn cycles_are_left_out_without_looping() {
        let tree = build_comment_tree(vec![
            comment("root", None, 0),
            comment("x", Some("y"), 1),
            comment("y", Some("x"), 2),
            comment("self", Some("self"), 3),
        ]);
        assert_eq!(ids(&tree), vec!["root"]);
        assert!(tree[0].replies.is_empty());
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let mut second = comment("a", None, 5);
        second.body = "duplicate".into();
        let tree = build_comment_tree(vec![comment("a", None, 0), second]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.body, "body of a");
    }

    #[test]
    fn deep_chains_do_not_exhaust_the_stack() {
        let mut comments = vec![comment("c0", None, 0)];
        for depth in 1..50_000 {
            let parent = format!("c{}", depth - 1);
            comments.push(comment(&format!("c{depth}"), Some(&parent), depth));
        }
        let tree = build_comment_tree(comments);
        assert_eq!(tree.len(), 1);

        let mut depth = 1;
        let mut node = &tree[0];
        while let Some(next) = node.replies.first() {
            node = next;
            depth += 1;
        }
        assert_eq!(depth, 50_000);
        drop(tree);
    }

    fn setup_service() -> (CommentService, String) {
        let db = Database::open_in_memory().expect("db");
        db.with_repositories(|repos| {
            repos.users().create(&UserRecord {
                id: "u1".into(),
                username: "alice".into(),
                email: None,
                password_hash: "hash".into(),
                created_at: now_utc(),
            })?;
            repos.posts().create(&PostRecord {
                id: "p1".into(),
                author_id: "u1".into(),
                title: "Hello".into(),
                body: "World".into(),
                created_at: now_utc(),
                updated_at: None,
            })?;
            repos.posts().create(&PostRecord {
                id: "p2".into(),
                author_id: "u1".into(),
                title: "Other".into(),
                body: "Post".into(),
                created_at: now_utc(),
                updated_at: None,
            })?;
            Ok(())
        })
        .expect("seed");
        (CommentService::new(db), "p1".to_string())
    }

    fn input(post_id: &str, body: &str, parent_id: Option<&str>) -> AddCommentInput {
        AddCommentInput {
            post_id: post_id.into(),
            author_id: "u1".into(),
            body: body.into(),
            parent_id: parent_id.map(str::to_string),
        }
    }

    #[test]
    fn service_builds_tree_from_stored_comments() {
        let (service, post_id) = setup_service();
        let root = service
            .add_comment(input(&post_id, "first", None))
            .expect("root");
        let reply = service
            .add_comment(input(&post_id, "reply", Some(&root.id)))
            .expect("reply");
        assert_eq!(reply.author_username, "alice");

        let tree = service.comment_tree(&post_id).expect("tree");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].comment.body, "first");
        assert_eq!(tree[0].replies[0].comment.id, reply.id);
    }

    #[test]
    fn reply_to_comment_on_another_post_is_rejected() {
        let (service, post_id) = setup_service();
        let root = service
            .add_comment(input(&post_id, "first", None))
            .expect("root");
        let err = service
            .add_comment(input("p2", "cross-post", Some(&root.id)))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[test]
    fn replies_past_the_depth_limit_are_rejected() {
        let (service, post_id) = setup_service();
        let mut parent = service
            .add_comment(input(&post_id, "depth 1", None))
            .expect("root");
        for depth in 2..=MAX_REPLY_DEPTH {
            parent = service
                .add_comment(input(&post_id, &format!("depth {depth}"), Some(&parent.id)))
                .expect("reply within limit");
        }

        let err = service
            .add_comment(input(&post_id, "too deep", Some(&parent.id)))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let tree = service.comment_tree(&post_id).expect("tree");
        assert_eq!(tree[0].subtree_size(), MAX_REPLY_DEPTH);
        let json = serde_json::to_string(&tree).expect("serialize");
        assert!(!json.contains("too deep"));
    }

    #[test]
    fn missing_post_and_blank_body_are_reported() {
        let (service, post_id) = setup_service();
        assert!(matches!(
            service.add_comment(input("nope", "hi", None)).unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            service.add_comment(input(&post_id, "   ", None)).unwrap_err(),
            ServiceError::Validation(_)
        ));
        assert!(matches!(
            service.comment_tree("nope").unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
