use ndarray::{Array1, Array2};

use crate::error::{AppError, AppResult};

/// Binary classifier estimating the probability that a song is liked
#[cfg_attr(test, mockall::automock)]
pub trait LikeClassifier {
    /// Fits the model on a feature matrix and 0/1 labels (1 = liked)
    fn fit(&mut self, features: &Array2<f64>, labels: &[u8]) -> AppResult<()>;

    /// Probability of the positive (liked) class for one feature vector
    fn predict_proba(&self, features: &Array1<f64>) -> AppResult<f64>;
}

/// L2-regularized logistic regression trained with batch gradient descent
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    learning_rate: f64,
    max_iter: usize,
    tol: f64,
    l2_penalty: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            coefficients: None,
            intercept: 0.0,
            learning_rate: 0.1,
            max_iter: 1000,
            tol: 1e-6,
            l2_penalty: 0.01,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_l2_penalty(mut self, l2_penalty: f64) -> Self {
        self.l2_penalty = l2_penalty;
        self
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    fn sigmoid(z: f64) -> f64 {
        1.0 / (1.0 + (-z).exp())
    }
}

impl LikeClassifier for LogisticRegression {
    fn fit(&mut self, features: &Array2<f64>, labels: &[u8]) -> AppResult<()> {
        let (n_samples, n_features) = features.dim();

        if n_samples != labels.len() {
            return Err(AppError::InvalidInput(format!(
                "Feature rows ({}) and labels ({}) must match",
                n_samples,
                labels.len()
            )));
        }
        if n_samples == 0 {
            return Err(AppError::InsufficientRows(
                "Cannot fit classifier with zero samples".to_string(),
            ));
        }
        if labels.iter().any(|&label| label > 1) {
            return Err(AppError::InvalidInput(
                "Labels must be 0 or 1".to_string(),
            ));
        }

        let targets: Array1<f64> = labels.iter().map(|&label| f64::from(label)).collect();
        let n = n_samples as f64;

        let mut weights = Array1::<f64>::zeros(n_features);
        let mut intercept = 0.0;
        let mut iterations = 0;

        for _ in 0..self.max_iter {
            iterations += 1;

            let probabilities = (features.dot(&weights) + intercept).mapv(Self::sigmoid);
            let errors = &probabilities - &targets;

            let weight_grad = features.t().dot(&errors) / n + &weights * self.l2_penalty;
            let intercept_grad = errors.sum() / n;

            weights.scaled_add(-self.learning_rate, &weight_grad);
            intercept -= self.learning_rate * intercept_grad;

            let max_grad = weight_grad
                .iter()
                .fold(intercept_grad.abs(), |acc, g| acc.max(g.abs()));
            if max_grad < self.tol {
                break;
            }
        }

        tracing::debug!(
            samples = n_samples,
            features = n_features,
            iterations,
            "Fitted logistic regression"
        );

        self.coefficients = Some(weights);
        self.intercept = intercept;

        Ok(())
    }

    fn predict_proba(&self, features: &Array1<f64>) -> AppResult<f64> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| AppError::NotReady("Classifier has not been fitted".to_string()))?;

        if coefficients.len() != features.len() {
            return Err(AppError::InvalidInput(format!(
                "Expected {} features, got {}",
                coefficients.len(),
                features.len()
            )));
        }

        Ok(Self::sigmoid(coefficients.dot(features) + self.intercept))
    }
}
