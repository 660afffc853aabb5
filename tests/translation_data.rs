mod common;

use common::{toy_corpus, WhitespaceTokenizer, EOS_ID, PAD_ID};
use std::io::Write;
use tch::Device;
use translation_finetune::data::{
    resolve_labels, split_sizes, Corpus, DataLoader, LabelId, SentencePair, Seq2SeqCollator,
    Seq2SeqTokenizer, TokenizedDataset, TranslationPreprocessor, ENGLISH2GERMAN_PREFIX,
    IGNORE_INDEX,
};
use translation_finetune::FineTuneError;

#[test]
fn corpus_from_jsonl() -> anyhow::Result<()> {
    let mut file = tempfile::NamedTempFile::new()?;
    writeln!(
        file,
        r#"{{"id": "0", "translation": {{"de": "Hallo Welt", "en": "Hello world"}}}}"#
    )?;
    writeln!(file, r#"{{"translation": {{"de": "Danke", "en": "Thanks"}}}}"#)?;

    let corpus = Corpus::from_jsonl(file.path())?;

    assert_eq!(corpus.len(), 2);
    assert_eq!(corpus.records()[0].id.as_deref(), Some("0"));
    assert_eq!(corpus.records()[1].text("de"), Some("Danke"));
    assert_eq!(corpus.records()[1].text("fr"), None);
    Ok(())
}

#[test]
fn source_ids_begin_with_prefix() -> anyhow::Result<()> {
    let corpus = toy_corpus(5);
    let tokenizer = WhitespaceTokenizer::from_corpus(&corpus, ENGLISH2GERMAN_PREFIX);
    let preprocessor = TranslationPreprocessor::default();

    let dataset = preprocessor.map(&tokenizer, &corpus, 2)?;
    let prefix_ids = tokenizer.encode(ENGLISH2GERMAN_PREFIX, 128);
    let prefix_ids = &prefix_ids[..prefix_ids.len() - 1];

    assert_eq!(dataset.len(), 5);
    for example in dataset.examples() {
        assert!(example.input_ids.starts_with(prefix_ids));
        assert_eq!(example.input_ids.last(), Some(&EOS_ID));
        assert_eq!(example.attention_mask.len(), example.input_ids.len());
        assert!(example.labels.iter().all(|label| !label.is_ignored()));
    }
    Ok(())
}

#[test]
fn truncation_keeps_end_of_sequence() -> anyhow::Result<()> {
    let corpus = toy_corpus(3);
    let tokenizer = WhitespaceTokenizer::from_corpus(&corpus, ENGLISH2GERMAN_PREFIX);
    let preprocessor = TranslationPreprocessor {
        max_source_length: 4,
        max_target_length: 2,
        ..Default::default()
    };

    let dataset = preprocessor.map(&tokenizer, &corpus, 1000)?;

    for example in dataset.examples() {
        assert_eq!(example.input_ids.len(), 4);
        assert_eq!(example.labels.len(), 2);
        assert_eq!(example.labels[1], LabelId::Token(EOS_ID));
    }
    Ok(())
}

#[test]
fn missing_language_reports_record_index() {
    let mut records = toy_corpus(4).records().to_vec();
    records.push(SentencePair::new(&[("en", "only english")]));
    let corpus = Corpus::new(records);
    let tokenizer = WhitespaceTokenizer::from_corpus(&corpus, ENGLISH2GERMAN_PREFIX);

    let error = TranslationPreprocessor::default()
        .map(&tokenizer, &corpus, 2)
        .unwrap_err();

    match error {
        FineTuneError::MissingField { index, language } => {
            assert_eq!(index, 4);
            assert_eq!(language, "de");
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn round_trip_reproduces_text() {
    let tokenizer = WhitespaceTokenizer::new(&["ein kleiner Hund"]);
    let ids = tokenizer.encode("ein   kleiner Hund", 128);
    assert_eq!(tokenizer.decode(&ids, true), "ein kleiner Hund");
}

#[test]
fn no_ignore_id_after_label_substitution() -> anyhow::Result<()> {
    let corpus = toy_corpus(5);
    let tokenizer = WhitespaceTokenizer::from_corpus(&corpus, ENGLISH2GERMAN_PREFIX);
    let dataset = TranslationPreprocessor::default().map(&tokenizer, &corpus, 1000)?;
    let collator = Seq2SeqCollator::new(&tokenizer, Device::Cpu);

    let batch = DataLoader::sequential(&dataset, &collator, 5)
        .next()
        .expect("one batch")?;

    let raw_labels = Vec::<i64>::try_from(&batch.labels.view([-1]))?;
    assert!(raw_labels.contains(&IGNORE_INDEX));
    for labels in &batch.label_ids {
        let resolved = resolve_labels(labels, tokenizer.pad_id());
        assert!(!resolved.contains(&IGNORE_INDEX));
    }
    Ok(())
}

#[test]
fn collator_pads_and_shifts() -> anyhow::Result<()> {
    let tokenizer = WhitespaceTokenizer::new(&["a b c"]);
    let collator = Seq2SeqCollator::new(&tokenizer, Device::Cpu);
    let dataset = TokenizedDataset::new(vec![
        translation_finetune::data::TokenizedExample {
            input_ids: vec![3, 4, EOS_ID],
            attention_mask: vec![1, 1, 1],
            labels: vec![LabelId::Token(5), LabelId::Token(EOS_ID)],
        },
        translation_finetune::data::TokenizedExample {
            input_ids: vec![3, EOS_ID],
            attention_mask: vec![1, 1],
            labels: vec![LabelId::Token(4), LabelId::Token(5), LabelId::Token(EOS_ID)],
        },
    ]);
    let examples = dataset.examples().iter().collect::<Vec<_>>();

    let batch = collator.collate(&examples)?;

    assert_eq!(batch.batch_size(), 2);
    assert_eq!(batch.input_ids.size(), vec![2, 3]);
    assert_eq!(
        Vec::<i64>::try_from(&batch.input_ids.view([-1]))?,
        vec![3, 4, EOS_ID, 3, EOS_ID, PAD_ID]
    );
    assert_eq!(
        Vec::<i64>::try_from(&batch.attention_mask.view([-1]))?,
        vec![1, 1, 1, 1, 1, 0]
    );
    assert_eq!(
        Vec::<i64>::try_from(&batch.labels.view([-1]))?,
        vec![5, EOS_ID, IGNORE_INDEX, 4, 5, EOS_ID]
    );
    assert_eq!(
        Vec::<i64>::try_from(&batch.decoder_input_ids.view([-1]))?,
        vec![PAD_ID, 5, EOS_ID, PAD_ID, 4, 5]
    );
    assert!(collator.collate(&[]).is_err());
    Ok(())
}

#[test]
fn collator_rounds_lengths_to_multiple() -> anyhow::Result<()> {
    let tokenizer = WhitespaceTokenizer::new(&["a b c"]);
    let collator = Seq2SeqCollator {
        pad_to_multiple_of: Some(8),
        ..Seq2SeqCollator::new(&tokenizer, Device::Cpu)
    };
    let dataset = TokenizedDataset::new(vec![
        translation_finetune::data::TokenizedExample {
            input_ids: vec![3, 4, EOS_ID],
            attention_mask: vec![1, 1, 1],
            labels: vec![LabelId::Token(5), LabelId::Token(EOS_ID)],
        },
        translation_finetune::data::TokenizedExample {
            input_ids: vec![3, EOS_ID],
            attention_mask: vec![1, 1],
            labels: vec![LabelId::Token(4), LabelId::Token(5), LabelId::Token(EOS_ID)],
        },
    ]);
    let examples = dataset.examples().iter().collect::<Vec<_>>();

    let batch = collator.collate(&examples)?;

    assert_eq!(batch.input_ids.size(), vec![2, 8]);
    assert_eq!(batch.attention_mask.size(), vec![2, 8]);
    assert_eq!(batch.labels.size(), vec![2, 8]);
    assert_eq!(batch.decoder_input_ids.size(), vec![2, 8]);
    assert_eq!(
        Vec::<i64>::try_from(&batch.attention_mask.get(1))?,
        vec![1, 1, 0, 0, 0, 0, 0, 0]
    );
    assert_eq!(
        Vec::<i64>::try_from(&batch.labels.get(0))?,
        vec![5, EOS_ID, IGNORE_INDEX, IGNORE_INDEX, IGNORE_INDEX, IGNORE_INDEX, IGNORE_INDEX, IGNORE_INDEX]
    );
    assert_eq!(
        Vec::<i64>::try_from(&batch.decoder_input_ids.get(1))?,
        vec![PAD_ID, 4, 5, EOS_ID, PAD_ID, PAD_ID, PAD_ID, PAD_ID]
    );
    assert_eq!(batch.label_ids[0].len(), 8);

    let unrounded = Seq2SeqCollator {
        pad_to_multiple_of: Some(1),
        ..collator
    }
    .collate(&examples)?;
    assert_eq!(unrounded.input_ids.size(), vec![2, 3]);
    Ok(())
}

#[test]
fn shuffled_loader_visits_every_example_once() -> anyhow::Result<()> {
    let corpus = toy_corpus(7);
    let tokenizer = WhitespaceTokenizer::from_corpus(&corpus, ENGLISH2GERMAN_PREFIX);
    let dataset = TranslationPreprocessor::default().map(&tokenizer, &corpus, 1000)?;
    let collator = Seq2SeqCollator::new(&tokenizer, Device::Cpu);

    let loader = DataLoader::shuffled(&dataset, &collator, 3, 42)?;
    assert_eq!(loader.num_batches(), 3);

    let batch_sizes = loader
        .map(|batch| batch.map(|batch| batch.batch_size()))
        .collect::<Result<Vec<usize>, FineTuneError>>()?;
    assert_eq!(batch_sizes, vec![3, 3, 1]);
    Ok(())
}

#[test]
fn split_sizes_follow_test_fraction() {
    assert_eq!(split_sizes(10, 0.2), (8, 2));
    assert_eq!(split_sizes(5, 0.2), (4, 1));
    assert_eq!(split_sizes(4, 0.2), (3, 1));
    assert_eq!(split_sizes(2, 0.2), (1, 1));
    assert_eq!(split_sizes(1, 0.2), (0, 1));
    assert_eq!(split_sizes(1000, 0.2), (800, 200));
}

#[test]
fn train_test_split_partitions_corpus() -> anyhow::Result<()> {
    let corpus = toy_corpus(10);

    let split = corpus.train_test_split(0.2, 42)?;
    let again = corpus.train_test_split(0.2, 42)?;

    assert_eq!(split.train.len(), 8);
    assert_eq!(split.test.len(), 2);
    assert_eq!(split.test, again.test);
    let mut ids = split
        .train
        .iter()
        .chain(split.test.iter())
        .filter_map(|record| record.id.as_deref())
        .map(|id| id.parse::<usize>())
        .collect::<Result<Vec<usize>, _>>()?;
    ids.sort_unstable();
    assert_eq!(ids, (0..10).collect::<Vec<usize>>());
    Ok(())
}

#[test]
fn train_test_split_rejects_empty_partitions() {
    assert!(matches!(
        toy_corpus(1).train_test_split(0.2, 42),
        Err(FineTuneError::InvalidSplit(_))
    ));
    assert!(matches!(
        toy_corpus(0).train_test_split(0.2, 42),
        Err(FineTuneError::InvalidSplit(_))
    ));
    assert!(toy_corpus(10).train_test_split(1.0, 42).is_err());
    assert_eq!(toy_corpus(2).train_test_split(0.2, 42).map(|s| s.test.len()).ok(), Some(1));
}
