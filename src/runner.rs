//! Batch runner for model points
//!
//! Holds one sealed model and evaluates any number of model points against
//! it, each in its own [`Run`](crate::evaluation::Run). A point that fails is
//! logged and reported without affecting the others.

use crate::error::{ModelError, Result};
use crate::input::ModelPoint;
use crate::model::Model;
use crate::settings::Settings;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;

/// Output series of one model point, in [`BatchResult::variables`] order
#[derive(Debug, Clone, PartialEq)]
pub struct PointResult {
    pub id: String,
    pub series: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointFailure {
    pub id: String,
    pub error: ModelError,
}

/// Results of a batch, successful points in input order
#[derive(Debug, Clone)]
pub struct BatchResult {
    pub variables: Vec<String>,
    /// Number of periods kept per series
    pub periods: usize,
    pub results: Vec<PointResult>,
    pub failures: Vec<PointFailure>,
}

impl BatchResult {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Pre-sealed model runner for batch projections
///
/// # Example
/// ```ignore
/// let runner = ModelRunner::new(Arc::new(model), settings)?;
/// let batch = runner.run_batch(&points);
/// println!("{} ok, {} failed", batch.results.len(), batch.failures.len());
/// ```
#[derive(Debug, Clone)]
pub struct ModelRunner {
    model: Arc<Model>,
    settings: Settings,
    variables: Vec<String>,
}

impl ModelRunner {
    /// Create a runner; every requested output variable must exist
    pub fn new(model: Arc<Model>, settings: Settings) -> Result<Self> {
        let settings = settings.validated();
        let variables = match &settings.output_variables {
            Some(names) => {
                for name in names {
                    model.catalog().resolve(name, None)?;
                }
                names.clone()
            }
            None => model.catalog().names().map(str::to_string).collect(),
        };

        if settings.output_variables.is_some() {
            for name in &variables {
                log::debug!(
                    "Output '{}' needs {} variable(s)",
                    name,
                    model.ancestors(name)?.len()
                );
            }
        }

        Ok(Self {
            model,
            settings,
            variables,
        })
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Variables written for each point
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Periods kept per output series
    pub fn output_periods(&self) -> usize {
        self.settings
            .t_max_output
            .min(self.model.horizon().t_max())
            + 1
    }

    /// Evaluate the output variables for one model point
    pub fn run_point(&self, point: &ModelPoint) -> Result<PointResult> {
        let run = self.model.run(point);
        let periods = self.output_periods();

        let series = self
            .variables
            .iter()
            .map(|name| Ok(run.full_series(name)?[..periods].to_vec()))
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Model point '{}' done, cache hit rate {:.1}%",
            point.id(),
            run.cache_hit_rate() * 100.0
        );
        Ok(PointResult {
            id: point.id().to_string(),
            series,
        })
    }

    /// Evaluate every model point, in parallel when enabled
    pub fn run_batch(&self, points: &[ModelPoint]) -> BatchResult {
        let start = Instant::now();

        let outcomes: Vec<(&ModelPoint, Result<PointResult>)> = if self.settings.multiprocessing {
            points
                .par_iter()
                .map(|point| (point, self.run_point(point)))
                .collect()
        } else {
            points
                .iter()
                .map(|point| (point, self.run_point(point)))
                .collect()
        };

        let mut results = Vec::with_capacity(points.len());
        let mut failures = Vec::new();
        for (point, outcome) in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(error) => {
                    log::error!("Model point '{}' failed: {}", point.id(), error);
                    failures.push(PointFailure {
                        id: point.id().to_string(),
                        error,
                    });
                }
            }
        }

        log::info!(
            "Evaluated {} model point(s) in {:?}: {} succeeded, {} failed",
            points.len(),
            start.elapsed(),
            results.len(),
            failures.len()
        );

        BatchResult {
            variables: self.variables.clone(),
            periods: self.output_periods(),
            results,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBuilder;

    fn model() -> Arc<Model> {
        let mut b = ModelBuilder::new(10);
        b.time_indexed("premium", |s, _| s.input("premium")).unwrap();
        b.time_indexed("fund", |s, t| {
            Ok(s.at("fund", t - 1)? * 1.01 + s.at("premium", t)?)
        })
        .unwrap();
        Arc::new(b.seal().unwrap())
    }

    fn points() -> Vec<ModelPoint> {
        vec![
            ModelPoint::new("a").with_field("premium", 10),
            ModelPoint::new("b").with_field("premium", "oops"),
            ModelPoint::new("c").with_field("premium", 30),
        ]
    }

    #[test]
    fn test_failures_are_isolated() {
        for multiprocessing in [true, false] {
            let settings = Settings {
                multiprocessing,
                ..Settings::default()
            };
            let runner = ModelRunner::new(model(), settings).unwrap();
            let batch = runner.run_batch(&points());

            assert!(!batch.is_success());
            assert_eq!(batch.results.len(), 2);
            assert_eq!(batch.results[0].id, "a");
            assert_eq!(batch.results[1].id, "c");
            assert_eq!(batch.failures.len(), 1);
            assert_eq!(batch.failures[0].id, "b");
            assert!(matches!(
                batch.failures[0].error,
                ModelError::InvalidInput { .. }
            ));

            // c has three times a's premium, so three times every value
            let a = &batch.results[0].series[1];
            let c = &batch.results[1].series[1];
            for (x, y) in a.iter().zip(c) {
                assert!((3.0 * x - y).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_output_selection_and_horizon() {
        let settings = Settings {
            output_variables: Some(vec!["fund".to_string()]),
            t_max_output: 4,
            ..Settings::default()
        };
        let runner = ModelRunner::new(model(), settings).unwrap();
        assert_eq!(runner.variables(), &["fund".to_string()]);
        assert_eq!(runner.output_periods(), 5);

        let result = runner
            .run_point(&ModelPoint::new("x").with_field("premium", 1))
            .unwrap();
        assert_eq!(result.series.len(), 1);
        assert_eq!(result.series[0].len(), 5);
        assert_eq!(result.series[0][0], 1.0);
    }

    #[test]
    fn test_unknown_output_variable_is_rejected() {
        let settings = Settings {
            output_variables: Some(vec!["nope".to_string()]),
            ..Settings::default()
        };
        assert!(matches!(
            ModelRunner::new(model(), settings),
            Err(ModelError::UnknownVariable { .. })
        ));
    }
}
