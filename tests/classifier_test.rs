use pme_classifier::{
    load_and_validate, Category, Classifier, ClassifierError, DatasetSchema, DecisionTable, TrainingConfig,
};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::thread;

fn dataset_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/raw/dataset.csv")
}

fn setup_test_classifier() -> &'static Classifier {
    static CLASSIFIER: OnceLock<Classifier> = OnceLock::new();
    CLASSIFIER.get_or_init(|| {
        let dataset = load_and_validate(dataset_path(), &DatasetSchema::default()).expect("bundled dataset is valid");
        let (classifier, _report) = Classifier::builder()
            .with_config(TrainingConfig::default())
            .with_dataset(dataset)
            .build()
            .expect("Failed to train classifier");
        classifier
    })
}

#[test]
fn test_information_scenario() -> Result<(), ClassifierError> {
    let classifier = setup_test_classifier();
    let result = classifier.predict("Avez-vous du riz en stock ?")?;
    assert_eq!(result.predicted_class, Category::Information);

    let decision = DecisionTable::default().decide(result.predicted_class, result.confidence);
    assert!(decision.action_description.contains("Réponse automatique"));
    assert!(!decision.client_reply.is_empty());
    Ok(())
}

#[test]
fn test_urgency_scenario() -> Result<(), ClassifierError> {
    let classifier = setup_test_classifier();
    let result = classifier.predict("URGENT ! Paiement bloqué")?;
    assert_eq!(result.predicted_class, Category::Urgency);

    let decision = DecisionTable::default().decide(result.predicted_class, result.confidence);
    assert!(decision.action_description.contains("immédiate"));
    assert!(decision.action_description.contains("responsable"));
    Ok(())
}

#[test]
fn test_empty_input_is_validation_error() {
    let classifier = setup_test_classifier();
    for text in ["", "   ", "\n\t"] {
        match classifier.predict(text) {
            Err(e @ ClassifierError::ValidationError(_)) => assert!(!e.is_load_error()),
            other => panic!("expected a validation error for {:?}, got {:?}", text, other),
        }
    }
}

#[test]
fn test_probability_invariants() -> Result<(), ClassifierError> {
    let classifier = setup_test_classifier();
    let inputs = [
        "Avez-vous du riz en stock ?",
        "Je voudrais commander trois sacs de sucre",
        "Le colis est arrivé abîmé, je suis mécontent",
        "URGENT ! Paiement bloqué",
        "xyzzy plugh",
    ];
    for text in inputs {
        let result = classifier.predict(text)?;
        assert_eq!(result.class_probabilities.len(), Category::COUNT);
        let sum: f64 = result.class_probabilities.values().sum();
        assert!((sum - 100.0).abs() <= 0.2, "probabilities for {:?} sum to {}", text, sum);
        assert!(result.class_probabilities.values().all(|p| (0.0..=100.0).contains(p)));
        let max = result.class_probabilities.values().cloned().fold(f64::MIN, f64::max);
        assert_eq!(result.confidence, max);
    }
    Ok(())
}

#[test]
fn test_prediction_is_deterministic() -> Result<(), ClassifierError> {
    let classifier = setup_test_classifier();
    let a = classifier.predict("Bonjour, avez-vous des oignons ?")?;
    let b = classifier.predict("Bonjour, avez-vous des oignons ?")?;
    assert_eq!(a, b);
    assert_eq!(a.confidence.to_bits(), b.confidence.to_bits());
    Ok(())
}

#[test]
fn test_training_is_reproducible() -> Result<(), ClassifierError> {
    let dataset = load_and_validate(dataset_path(), &DatasetSchema::default())?;
    let (first, report_first) = Classifier::builder().with_dataset(dataset.clone()).build()?;
    let (second, report_second) = Classifier::builder().with_dataset(dataset).build()?;
    assert_eq!(first.metadata().model_id, second.metadata().model_id);
    assert_eq!(report_first, report_second);
    Ok(())
}

#[test]
fn test_evaluation_report() -> Result<(), ClassifierError> {
    let dataset = load_and_validate(dataset_path(), &DatasetSchema::default())?;
    let total = dataset.len();
    let (_, report) = Classifier::builder().with_dataset(dataset).build()?;

    assert_eq!(report.primary_metric, "weighted_f1");
    assert_eq!(report.train_size + report.test_size, total);
    assert_eq!(report.test_size, (total as f64 * 0.2).ceil() as usize);
    assert_eq!(report.cross_validation.scores.len(), 5);
    assert!(report.test.accuracy > 0.5);

    let matrix_total: usize = report.test.confusion_matrix.iter().flatten().sum();
    assert_eq!(matrix_total, report.test_size);

    let json = serde_json::to_value(&report).unwrap();
    assert!(json["test"]["per_class"].get("Urgence").is_some());
    Ok(())
}

#[test]
fn test_classifier_info() {
    let info = setup_test_classifier().info();
    assert_eq!(info.num_classes, 4);
    assert_eq!(info.class_labels, vec!["Information", "Commande", "Réclamation", "Urgence"]);
    assert!(info.vocabulary_size > 0);
    assert!(info.trained_at.is_some());
}

#[test]
fn test_thread_safety() {
    let classifier = Arc::new(setup_test_classifier().clone());
    let mut handles = vec![];

    for _ in 0..3 {
        let classifier = Arc::clone(&classifier);
        let handle = thread::spawn(move || {
            let result = classifier.predict("URGENT ! Paiement bloqué");
            assert!(result.is_ok());
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_predictions_agree() {
    let classifier = Arc::new(setup_test_classifier().clone());
    let expected = classifier.predict("Avez-vous du riz en stock ?").unwrap();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let classifier = Arc::clone(&classifier);
        tasks.push(tokio::task::spawn_blocking(move || {
            classifier.predict("Avez-vous du riz en stock ?").unwrap()
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap(), expected);
    }
}
