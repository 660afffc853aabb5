mod common;

use common::{WhitespaceTokenizer, PAD_ID};
use tch::Tensor;
use translation_finetune::data::{LabelId, Seq2SeqTokenizer, IGNORE_INDEX};
use translation_finetune::metrics::{
    corpus_bleu, generated_length, postprocess_text, MetricEvaluator, ModelPredictions,
};
use translation_finetune::FineTuneError;

#[test]
fn postprocess_trims_and_wraps() {
    let (predictions, references) =
        postprocess_text(&["  Das Haus \n", "gut"], &["das Haus ", "\tgut"]);

    assert_eq!(predictions, vec!["Das Haus".to_string(), "gut".to_string()]);
    assert_eq!(
        references,
        vec![vec!["das Haus".to_string()], vec!["gut".to_string()]]
    );
}

#[test]
fn generated_length_counts_non_pad_tokens() -> anyhow::Result<()> {
    assert_eq!(generated_length(&[vec![5, 5, 0, 0]], 0)?, 2.0);
    assert_eq!(generated_length(&[vec![5, 5, 0, 0], vec![1, 2, 3, 0]], 0)?, 2.5);
    assert!(matches!(
        generated_length(&[], 0),
        Err(FineTuneError::EmptyPredictions)
    ));
    Ok(())
}

#[test]
fn bleu_perfect_and_disjoint() -> anyhow::Result<()> {
    let hypotheses = ["the cat sat on the mat"];
    let references = vec![vec!["the cat sat on the mat"]];
    assert!((corpus_bleu(&hypotheses, &references)?.score - 100.0).abs() < 1e-9);

    let disjoint = corpus_bleu(&["a b c d"], &[vec!["e f g h"]])?;
    assert_eq!(disjoint.score, 0.0);
    assert_eq!(disjoint.counts[0], 0);
    assert_eq!(disjoint.precisions, [0.0; 4]);
    assert_eq!(disjoint.totals, [4, 3, 2, 1]);
    Ok(())
}

#[test]
fn bleu_applies_brevity_penalty() -> anyhow::Result<()> {
    let bleu = corpus_bleu(
        &["the cat sat on the"],
        &[vec!["the cat sat on the mat"]],
    )?;

    assert_eq!(bleu.sys_len, 5);
    assert_eq!(bleu.ref_len, 6);
    assert!((bleu.brevity_penalty - (1.0f64 - 6.0 / 5.0).exp()).abs() < 1e-12);
    assert!((bleu.score - 100.0 * bleu.brevity_penalty).abs() < 1e-9);
    Ok(())
}

#[test]
fn bleu_invariant_to_joint_reordering() -> anyhow::Result<()> {
    let hypotheses = vec![
        "the small dog runs in the garden",
        "it is raining today",
        "my book is on the table",
    ];
    let references = vec![
        vec!["the little dog runs in the garden"],
        vec!["it rains today"],
        vec!["my book lies on the table"],
    ];
    let reference_score = corpus_bleu(&hypotheses, &references)?.score;

    let order = [2usize, 0, 1];
    let reordered_hypotheses = order.iter().map(|&i| hypotheses[i]).collect::<Vec<_>>();
    let reordered_references = order
        .iter()
        .map(|&i| references[i].clone())
        .collect::<Vec<_>>();
    let reordered_score = corpus_bleu(&reordered_hypotheses, &reordered_references)?.score;
    assert!((reference_score - reordered_score).abs() < 1e-9);

    let misaligned_references = vec![
        references[1].clone(),
        references[2].clone(),
        references[0].clone(),
    ];
    let misaligned_score = corpus_bleu(&hypotheses, &misaligned_references)?.score;
    assert!(misaligned_score < reference_score);
    Ok(())
}

#[test]
fn bleu_rejects_mismatched_inputs() {
    assert!(corpus_bleu(&["a"], &[vec!["a"], vec!["b"]]).is_err());
    let no_reference: Vec<Vec<&str>> = vec![vec![]];
    assert!(corpus_bleu(&["a"], &no_reference).is_err());
}

#[test]
fn evaluator_decodes_predictions_and_labels() -> anyhow::Result<()> {
    let tokenizer = WhitespaceTokenizer::new(&["das Haus ist gross"]);
    let mut prediction = tokenizer.encode("das Haus ist gross", 16);
    prediction.insert(0, PAD_ID);
    prediction.extend([PAD_ID, PAD_ID]);
    let mut labels = tokenizer
        .encode("das Haus ist gross", 16)
        .into_iter()
        .map(LabelId::Token)
        .collect::<Vec<LabelId>>();
    labels.extend([LabelId::from(IGNORE_INDEX), LabelId::Ignore]);

    let metrics = MetricEvaluator::new(&tokenizer)
        .compute(ModelPredictions::Sequences(vec![prediction]), &[labels])?;

    assert_eq!(metrics.bleu, 100.0);
    assert_eq!(metrics.gen_len, 5.0);
    assert_eq!(metrics.eval_loss, None);
    assert_eq!(metrics.to_map().len(), 2);
    Ok(())
}

#[test]
fn evaluator_accepts_auxiliary_outputs() -> anyhow::Result<()> {
    let tokenizer = WhitespaceTokenizer::new(&["guten Morgen liebe Freunde"]);
    let sequence = tokenizer.encode("guten Morgen liebe Freunde", 16);
    let labels = sequence
        .iter()
        .map(|&id| LabelId::Token(id))
        .collect::<Vec<LabelId>>();
    let predictions = ModelPredictions::WithAuxiliary {
        sequences: vec![sequence],
        auxiliary: vec![Tensor::zeros([1, 3, 5], (tch::Kind::Float, tch::Device::Cpu))],
    };
    assert_eq!(predictions.len(), 1);

    let metrics = MetricEvaluator::new(&tokenizer).compute(predictions, &[labels])?;

    assert_eq!(metrics.bleu, 100.0);
    assert_eq!(metrics.gen_len, 5.0);
    Ok(())
}

#[test]
fn evaluator_rejects_empty_predictions() {
    let tokenizer = WhitespaceTokenizer::new(&["a"]);
    let result = MetricEvaluator::new(&tokenizer).compute(ModelPredictions::Sequences(vec![]), &[]);
    assert!(matches!(result, Err(FineTuneError::EmptyPredictions)));
}
