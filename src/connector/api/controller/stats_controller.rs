use anyhow::Result;

use crate::connector::{EmbeddingStore, PassageCorpus};
use crate::domain::PassageId;

use super::super::Container;

pub struct StatsController<'a> {
    container: &'a Container,
}

impl<'a> StatsController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn stats(&self) -> Result<String> {
        let store = self.container.load_store()?;
        let corpus = self.container.load_corpus()?;
        Ok(self.format_stats(&store, &corpus))
    }

    fn format_stats(&self, store: &EmbeddingStore<PassageId>, corpus: &PassageCorpus) -> String {
        format!(
            "Knowledge Base Statistics\n=========================\nPassages:     {}\nTexts:        {}\nDimension:    {}\nMetric:       {}\nTrees:        {}\nBuild ID:     {}\nData Dir:     {}",
            store.size(),
            corpus.len(),
            store.dimension(),
            store.metric(),
            store.tree_count(),
            store.build_id(),
            self.container.data_dir().display()
        )
    }
}
