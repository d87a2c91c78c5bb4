//! ONNX Runtime sentence embedder (all-MiniLM-L6-v2 and other BERT-style
//! encoders exporting `last_hidden_state`).

use ndarray::Array2;
use ort::{inputs, session::Session, value::Value};
use std::path::Path;
use std::sync::Mutex;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::debug;

use super::EmbeddingProvider;
use crate::error::{Result, RouterError};

/// Position limit of BERT-style encoders
const MAX_TOKENS: usize = 512;

/// Mean-pooled, L2-normalized sentence embeddings from an ONNX model.
pub struct OnnxEmbedder {
    /// `run` needs `&mut Session`
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    dimensions: usize,
    name: String,
}

impl OnnxEmbedder {
    /// Load the model and its `tokenizer.json`. `dimensions` is the hidden
    /// size the model must produce (384 for all-MiniLM-L6-v2).
    pub fn load(model_path: &Path, tokenizer_path: &Path, dimensions: usize) -> Result<Self> {
        let stem = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model");
        let name = format!("onnx-{}", stem);
        let fail = |reason: String| RouterError::Provider {
            provider: name.clone(),
            reason,
        };

        if !model_path.exists() {
            return Err(fail(format!(
                "model not found at {} (all-MiniLM-L6-v2: https://huggingface.co/Xenova/all-MiniLM-L6-v2/resolve/main/onnx/model_quantized.onnx)",
                model_path.display()
            )));
        }
        if !tokenizer_path.exists() {
            return Err(fail(format!(
                "tokenizer not found at {}",
                tokenizer_path.display()
            )));
        }

        let session = Session::builder()
            .and_then(|builder| builder.commit_from_file(model_path))
            .map_err(|e| fail(format!("failed to load model: {}", e)))?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| fail(format!("failed to load tokenizer: {}", e)))?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_TOKENS,
                ..Default::default()
            }))
            .map_err(|e| fail(format!("failed to configure truncation: {}", e)))?;

        debug!("Loaded ONNX model {:?} ({} dims)", model_path, dimensions);

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            dimensions,
            name,
        })
    }

    fn failure(&self, reason: impl Into<String>) -> RouterError {
        RouterError::Provider {
            provider: self.name.clone(),
            reason: reason.into(),
        }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| self.failure(format!("tokenization failed: {}", e)))?;

        let ids: Vec<i64> = encoding.get_ids().iter().map(|&x| x as i64).collect();
        let mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&x| x as i64)
            .collect();
        let shape = (1, ids.len());

        let ids = Array2::from_shape_vec(shape, ids)
            .map_err(|e| self.failure(format!("bad input_ids shape: {}", e)))?;
        let mask_array = Array2::from_shape_vec(shape, mask.clone())
            .map_err(|e| self.failure(format!("bad attention_mask shape: {}", e)))?;
        // Single-sentence input: all segment ids are zero
        let token_types = Array2::<i64>::zeros(shape);

        let tensor_err = |e: ort::Error| self.failure(format!("tensor creation failed: {}", e));
        let ids = Value::from_array(ids).map_err(tensor_err)?;
        let mask_value = Value::from_array(mask_array).map_err(tensor_err)?;
        let token_types = Value::from_array(token_types).map_err(tensor_err)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| self.failure("session lock poisoned"))?;
        let outputs = session
            .run(inputs![
                "input_ids" => ids,
                "attention_mask" => mask_value,
                "token_type_ids" => token_types
            ])
            .map_err(|e| self.failure(format!("inference failed: {}", e)))?;

        let (shape, data) = outputs["last_hidden_state"]
            .try_extract_tensor::<f32>()
            .map_err(|e| self.failure(format!("no last_hidden_state: {}", e)))?;

        // [batch = 1, seq_len, hidden]
        let dims = shape.as_ref();
        if dims.len() != 3 {
            return Err(self.failure(format!("expected a 3D output, got {:?}", dims)));
        }
        let seq_len = dims[1] as usize;
        let hidden = dims[2] as usize;
        if hidden != self.dimensions {
            return Err(RouterError::Dimensions {
                expected: self.dimensions,
                actual: hidden,
            });
        }

        Ok(mean_pool(&data[..seq_len * hidden], &mask, hidden))
    }
}

/// Average the token rows selected by `mask`, then L2-normalize.
fn mean_pool(tokens: &[f32], mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden];
    let mut count = 0.0f32;
    for (row, &m) in tokens.chunks_exact(hidden).zip(mask) {
        if m == 1 {
            count += 1.0;
            for (p, v) in pooled.iter_mut().zip(row) {
                *p += v;
            }
        }
    }
    if count == 0.0 {
        return pooled;
    }

    let norm: f32 = pooled.iter().map(|x| (x / count).powi(2)).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for p in &mut pooled {
            *p = *p / count / norm;
        }
    }
    pooled
}

impl EmbeddingProvider for OnnxEmbedder {
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.name
    }
}
