use std::fs;

use parking_lot::Mutex;
use tch::{Device, Tensor, no_grad};
use tokenizers::Tokenizer;

use crate::{config::AppConfig, error::ServiceError, model::TextBackend};

// Llama-family end-of-sequence token id.
const EOS_TOKEN_ID: i64 = 2;

/// TorchScript-backed code-generation backend. Greedy decode: with the
/// service's near-zero temperature the argmax token is the sampled token.
pub struct TchBackend {
    tokenizer: Tokenizer,
    module: Mutex<tch::CModule>,
    device: Device,
    max_new_tokens: usize,
}

impl TchBackend {
    pub fn load(config: &AppConfig) -> Result<Self, ServiceError> {
        if !config.model_path.exists() {
            return Err(ServiceError::Other(format!(
                "model artifact missing: {}",
                config.model_path.display()
            )));
        }
        let size_bytes = fs::metadata(&config.model_path)?.len();

        let tokenizer = Tokenizer::from_file(config.tokenizer_path.as_path())
            .map_err(|e| ServiceError::Other(format!("tokenizer error: {e}")))?;

        let mut module = tch::CModule::load_on_device(&config.model_path, config.device)
            .map_err(|e| ServiceError::Inference(e.to_string()))?;
        module.set_eval();

        // Temperature is fixed near zero, so decoding stays greedy; it is
        // logged here with the rest of the generation parameters.
        tracing::debug!(
            size_bytes,
            max_new_tokens = config.max_new_tokens,
            temperature = config.temperature,
            "TorchScript module loaded"
        );

        Ok(Self {
            tokenizer,
            module: Mutex::new(module),
            device: config.device,
            max_new_tokens: config.max_new_tokens,
        })
    }
}

impl TextBackend for TchBackend {
    fn infer(&self, prompt: &str) -> Result<String, ServiceError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ServiceError::Other(format!("tokenizer error: {e}")))?;
        let mut input_ids: Vec<i64> = encoding.get_ids().iter().map(|&id| id as i64).collect();
        if input_ids.is_empty() {
            input_ids.push(0);
        }
        let prompt_token_len = input_ids.len();

        no_grad(|| {
            let module = self.module.lock();

            for _ in 0..self.max_new_tokens {
                let input_tensor = Tensor::from_slice(&input_ids)
                    .reshape([1, input_ids.len() as i64])
                    .to(self.device);

                let output = module
                    .forward_is(&[tch::IValue::Tensor(input_tensor)])
                    .map_err(|e| ServiceError::Inference(e.to_string()))?;

                // The traced model may return raw logits or a (logits, past)
                // tuple depending on how it was exported.
                let logits = match output {
                    tch::IValue::Tensor(t) => t,
                    tch::IValue::Tuple(ref tuple) if !tuple.is_empty() => match &tuple[0] {
                        tch::IValue::Tensor(t) => t.shallow_clone(),
                        _ => {
                            return Err(ServiceError::Inference(
                                "expected tensor as first tuple element".into(),
                            ));
                        }
                    },
                    _ => {
                        return Err(ServiceError::Inference(
                            "unexpected model output format".into(),
                        ));
                    }
                };

                // Logits shape [1, seq_len, vocab_size]; take the last position.
                let last_logits = logits.select(1, -1).squeeze();
                let next_token_id = last_logits.argmax(0, false).int64_value(&[]);

                input_ids.push(next_token_id);

                if next_token_id == EOS_TOKEN_ID {
                    break;
                }
            }

            Ok::<(), ServiceError>(())
        })?;

        let generated_ids: Vec<u32> = input_ids[prompt_token_len..]
            .iter()
            .map(|&id| id as u32)
            .collect();

        self.tokenizer
            .decode(&generated_ids, true)
            .map_err(|e| ServiceError::Other(format!("tokenizer error: {e}")))
    }
}
