use anyhow::Result;

use crate::connector::PassageCorpus;
use crate::domain::{extract_attribution, PassageId, QueryResult};

use super::super::Container;

pub struct QueryController<'a> {
    container: &'a Container,
}

impl<'a> QueryController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn query(
        &self,
        text: String,
        num: usize,
        search_effort: Option<usize>,
    ) -> Result<String> {
        let store = self.container.load_store()?;
        let corpus = self.container.load_corpus()?;

        let vector = self.container.embedding_service().embed(&text).await?;
        let results = store.query(&vector, num, search_effort)?;

        Ok(self.format_results(&results, &corpus))
    }

    fn format_results(&self, results: &[QueryResult<PassageId>], corpus: &PassageCorpus) -> String {
        if results.is_empty() {
            return "No results found.".to_string();
        }

        let mut output = format!("Found {} results:\n\n", results.len());
        for (i, result) in results.iter().enumerate() {
            let Some(text) = corpus.get(result.payload()) else {
                output.push_str(&format!(
                    "{}. {} (distance: {:.3}) [missing text]\n\n",
                    i + 1,
                    result.payload(),
                    result.distance()
                ));
                continue;
            };

            let attribution = extract_attribution(text);
            output.push_str(&format!(
                "{}. {} (distance: {:.3})\n",
                i + 1,
                attribution.source,
                result.distance()
            ));
            output.push_str(&format!("   | {}\n\n", attribution.body));
        }
        output.trim_end().to_string()
    }
}
