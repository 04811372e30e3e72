use anyhow::{anyhow, Result};
use serde_json::json;

use crate::domain::ItemId;

use super::super::Container;

pub struct ItemsController<'a> {
    container: &'a Container,
}

impl<'a> ItemsController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// One JSON object per line, in item id order. With an id, prints that
    /// single item including its vector.
    pub async fn items(&self, limit: Option<usize>, id: Option<ItemId>) -> Result<String> {
        let store = self.container.load_store()?;
        let corpus = self.container.load_corpus()?;

        if let Some(id) = id {
            let (payload, vector) = store
                .payload(id)
                .zip(store.get_vector(id))
                .ok_or_else(|| anyhow!("No item with id {} (store has {})", id, store.size()))?;
            return Ok(serde_json::to_string(&json!({
                "id": id,
                "passage_id": payload,
                "text": corpus.get(payload),
                "vector": vector,
            }))?);
        }

        let lines = store
            .items()
            .take(limit.unwrap_or(usize::MAX))
            .map(|item| {
                serde_json::to_string(&json!({
                    "id": item.id,
                    "passage_id": item.payload,
                    "text": corpus.get(item.payload),
                }))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::application::BuildConfig;
    use crate::connector::api::ContainerConfig;
    use crate::application::EmbeddingService;
    use crate::connector::MockEmbedding;
    use crate::domain::Passage;

    async fn container_with_store(dir: &std::path::Path) -> Container {
        let container = Container::with_embedding_service(
            ContainerConfig {
                data_dir: dir.to_path_buf(),
                mock_embeddings: true,
                dimensions: Some(4),
                ..ContainerConfig::default()
            },
            Arc::new(MockEmbedding::with_dimensions(4)),
        );
        container
            .build_use_case(BuildConfig {
                dimension: 4,
                tree_count: 2,
                seed: Some(3),
                ..BuildConfig::default()
            })
            .execute(
                vec![Passage::new("first answer"), Passage::new("second answer")],
                dir,
            )
            .await
            .unwrap();
        container
    }

    #[tokio::test]
    async fn test_items_lists_every_item() {
        let dir = tempfile::tempdir().unwrap();
        let container = container_with_store(dir.path()).await;

        let output = ItemsController::new(&container).items(None, None).await.unwrap();

        let lines: Vec<serde_json::Value> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["id"], 1);
        assert_eq!(lines[1]["text"], "second answer");
        assert!(lines[0].get("vector").is_none());
    }

    #[tokio::test]
    async fn test_single_item_includes_vector() {
        let dir = tempfile::tempdir().unwrap();
        let container = container_with_store(dir.path()).await;
        let expected = MockEmbedding::with_dimensions(4)
            .embed("first answer")
            .await
            .unwrap();

        let output = ItemsController::new(&container)
            .items(None, Some(0))
            .await
            .unwrap();

        let item: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(item["text"], "first answer");
        let vector: Vec<f32> = serde_json::from_value(item["vector"].clone()).unwrap();
        assert_eq!(vector, expected);
    }

    #[tokio::test]
    async fn test_unknown_item_id_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let container = container_with_store(dir.path()).await;

        let err = ItemsController::new(&container)
            .items(None, Some(7))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No item with id 7"));
    }
}
