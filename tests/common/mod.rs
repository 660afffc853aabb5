#![allow(dead_code)]

use std::collections::HashMap;
use tch::nn::Module;
use tch::{nn, Kind, Tensor};
use translation_finetune::data::{Corpus, SentencePair, Seq2SeqTokenizer};
use translation_finetune::trainer::Seq2SeqModel;

pub const PAD_ID: i64 = 0;
pub const EOS_ID: i64 = 1;
pub const UNK_ID: i64 = 2;

/// Word-level tokenizer with a fixed vocabulary, appending an end of sequence token
pub struct WhitespaceTokenizer {
    vocab: HashMap<String, i64>,
    words: Vec<String>,
}

impl WhitespaceTokenizer {
    pub fn new<S: AsRef<str>>(sentences: &[S]) -> WhitespaceTokenizer {
        let mut words = vec!["<pad>".to_string(), "</s>".to_string(), "<unk>".to_string()];
        let mut vocab = HashMap::new();
        for (id, word) in words.iter().enumerate() {
            vocab.insert(word.clone(), id as i64);
        }
        for sentence in sentences {
            for word in sentence.as_ref().split_whitespace() {
                if !vocab.contains_key(word) {
                    vocab.insert(word.to_string(), words.len() as i64);
                    words.push(word.to_string());
                }
            }
        }
        WhitespaceTokenizer { vocab, words }
    }

    pub fn from_corpus(corpus: &Corpus, prefix: &str) -> WhitespaceTokenizer {
        let mut sentences = vec![prefix.to_string()];
        for record in corpus.iter() {
            sentences.extend(record.translation.values().cloned());
        }
        WhitespaceTokenizer::new(&sentences)
    }

    pub fn vocab_size(&self) -> i64 {
        self.words.len() as i64
    }
}

impl Seq2SeqTokenizer for WhitespaceTokenizer {
    fn encode(&self, text: &str, max_length: usize) -> Vec<i64> {
        let mut token_ids = text
            .split_whitespace()
            .map(|word| *self.vocab.get(word).unwrap_or(&UNK_ID))
            .collect::<Vec<i64>>();
        token_ids.truncate(max_length.saturating_sub(1));
        token_ids.push(EOS_ID);
        token_ids
    }

    fn decode(&self, token_ids: &[i64], skip_special_tokens: bool) -> String {
        token_ids
            .iter()
            .filter(|&&id| !(skip_special_tokens && (id == PAD_ID || id == EOS_ID)))
            .map(|&id| {
                self.words
                    .get(id as usize)
                    .map(String::as_str)
                    .unwrap_or("<unk>")
            })
            .collect::<Vec<&str>>()
            .join(" ")
    }

    fn pad_id(&self) -> i64 {
        PAD_ID
    }

    fn eos_id(&self) -> i64 {
        EOS_ID
    }
}

/// Bag-of-words encoder with a position-wise decoder
pub struct TinySeq2Seq {
    encoder_embeddings: nn::Embedding,
    decoder_embeddings: nn::Embedding,
    lm_head: nn::Linear,
}

impl TinySeq2Seq {
    pub fn new(p: &nn::Path, vocab_size: i64, hidden_size: i64) -> TinySeq2Seq {
        TinySeq2Seq {
            encoder_embeddings: nn::embedding(
                p / "encoder",
                vocab_size,
                hidden_size,
                Default::default(),
            ),
            decoder_embeddings: nn::embedding(
                p / "decoder",
                vocab_size,
                hidden_size,
                Default::default(),
            ),
            lm_head: nn::linear(p / "lm_head", hidden_size, vocab_size, Default::default()),
        }
    }
}

impl Seq2SeqModel for TinySeq2Seq {
    fn forward_t(
        &self,
        input_ids: &Tensor,
        attention_mask: &Tensor,
        decoder_input_ids: &Tensor,
        _train: bool,
    ) -> Tensor {
        let encoder_hidden_states = self.encode(input_ids, attention_mask);
        self.decode(&encoder_hidden_states, attention_mask, decoder_input_ids)
    }

    fn encode(&self, input_ids: &Tensor, _attention_mask: &Tensor) -> Tensor {
        self.encoder_embeddings.forward(input_ids)
    }

    fn decode(
        &self,
        encoder_hidden_states: &Tensor,
        attention_mask: &Tensor,
        decoder_input_ids: &Tensor,
    ) -> Tensor {
        let context = attention_mask
            .to_kind(Kind::Float)
            .unsqueeze(1)
            .matmul(encoder_hidden_states);
        let hidden = (self.decoder_embeddings.forward(decoder_input_ids) + context).tanh();
        self.lm_head.forward(&hidden)
    }
}

pub fn toy_corpus(size: usize) -> Corpus {
    let english = ["the house", "a small dog", "the big cat", "good morning", "my book"];
    let german = ["das Haus", "ein kleiner Hund", "die grosse Katze", "guten Morgen", "mein Buch"];
    Corpus::new(
        (0..size)
            .map(|index| {
                let mut pair = SentencePair::new(&[
                    ("en", english[index % english.len()]),
                    ("de", german[index % german.len()]),
                ]);
                pair.id = Some(index.to_string());
                pair
            })
            .collect(),
    )
}
