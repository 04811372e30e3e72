use std::path::PathBuf;

use anyhow::Result;

use crate::application::{BuildConfig, BuildReport};
use crate::domain::DistanceMetric;

use super::super::Container;

pub struct BuildController<'a> {
    container: &'a Container,
}

impl<'a> BuildController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn build(
        &self,
        corpus: PathBuf,
        trees: usize,
        metric: DistanceMetric,
        seed: Option<u64>,
        concurrency: usize,
        batch_size: usize,
        extensions: Option<Vec<String>>,
    ) -> Result<String> {
        let passages = self.container.corpus_loader(extensions).load(&corpus)?;

        let config = BuildConfig {
            dimension: self.container.dimensions(),
            metric,
            tree_count: trees,
            seed,
            concurrency,
            batch_size,
        };
        let report = self
            .container
            .build_use_case(config)
            .execute(passages, self.container.data_dir())
            .await?;

        Ok(self.format_report(&report))
    }

    fn format_report(&self, report: &BuildReport) -> String {
        let mut output = format!(
            "Successfully built store: {} passages, {} trees, {} dims, {} metric ({:.2}s)\nOutput: {}",
            report.indexed,
            report.tree_count,
            report.dimension,
            report.metric,
            report.elapsed.as_secs_f64(),
            report.output_dir.display()
        );
        if report.skipped > 0 {
            output.push_str(&format!(
                "\nSkipped {} passages that could not be embedded",
                report.skipped
            ));
        }
        output
    }
}
