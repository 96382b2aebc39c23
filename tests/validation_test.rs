use pme_classifier::{
    load_and_validate, train, Category, Classifier, ClassifierError, Dataset, DatasetSchema, Example, Settings,
    TrainingConfig,
};
use std::fs;
use std::path::PathBuf;

fn bundled_dataset() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/raw/dataset.csv")
}

fn write_csv(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("dataset.csv");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn test_bundled_dataset_is_valid() -> Result<(), ClassifierError> {
    let dataset = load_and_validate(bundled_dataset(), &DatasetSchema::default())?;
    assert!(dataset.len() >= 100);
    for example in dataset.examples() {
        assert!(!example.text.trim().is_empty());
        assert!(Category::ALL.contains(&example.label));
    }
    assert!(dataset.class_counts().iter().all(|&count| count >= 5));
    Ok(())
}

#[test]
fn test_accented_text_survives_loading() -> Result<(), ClassifierError> {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        &dir,
        "\u{feff}texte,classe\n\
         \"Où êtes-vous situés, près du marché ?\",Information\n\
         Je commande deux crêpes,Commande\n\
         Reçu un colis abîmé,Reclamation\n\
         URGENT paiement bloqué,Urgence\n",
    );
    let schema = DatasetSchema {
        min_examples: 4,
        ..DatasetSchema::default()
    };
    let dataset = load_and_validate(&path, &schema)?;
    assert_eq!(dataset.examples()[0].text, "Où êtes-vous situés, près du marché ?");
    assert_eq!(dataset.examples()[2].label, Category::Complaint);
    Ok(())
}

#[test]
fn test_custom_columns() -> Result<(), ClassifierError> {
    let dir = tempfile::tempdir().unwrap();
    let path = write_csv(
        &dir,
        "id,message,categorie\n1,Avez-vous du pain,Information\n2,Je commande du pain,Commande\n\
         3,Pain rassis reçu,Réclamation\n4,Urgent caisse bloquée,Urgence\n",
    );
    let schema = DatasetSchema {
        text_column: "message".into(),
        label_column: "categorie".into(),
        min_examples: 4,
    };
    assert_eq!(load_and_validate(&path, &schema)?.len(), 4);
    Ok(())
}

#[test]
fn test_each_failure_has_its_own_error() {
    let dir = tempfile::tempdir().unwrap();
    let schema = DatasetSchema {
        min_examples: 1,
        ..DatasetSchema::default()
    };

    let path = write_csv(&dir, "texte\nBonjour\n");
    assert!(matches!(
        load_and_validate(&path, &schema),
        Err(ClassifierError::SchemaError { .. })
    ));

    let path = write_csv(&dir, "texte,classe\n\"\",Information\n");
    assert!(matches!(
        load_and_validate(&path, &schema),
        Err(ClassifierError::DataQualityError { .. })
    ));

    let path = write_csv(&dir, "texte,classe\nBonjour,Inconnue\n");
    assert!(matches!(
        load_and_validate(&path, &schema),
        Err(ClassifierError::InvalidLabelError { .. })
    ));

    let path = write_csv(&dir, "texte,classe\nBonjour,Information\n");
    assert!(matches!(
        load_and_validate(
            &path,
            &DatasetSchema {
                min_examples: 20,
                ..DatasetSchema::default()
            }
        ),
        Err(ClassifierError::InsufficientDataError(_))
    ));

    assert!(matches!(
        load_and_validate(dir.path().join("absent.csv"), &schema),
        Err(ClassifierError::DatasetUnreadable { .. })
    ));
}

#[test]
fn test_undersized_class_aborts_training_without_artifact() {
    let mut examples = Vec::new();
    for category in [Category::Information, Category::Order, Category::Complaint] {
        for i in 0..8 {
            examples.push(Example::new(format!("{} message numéro {}", category, i), category));
        }
    }
    // Enough for a train/test split but not for 5 folds
    for i in 0..3 {
        examples.push(Example::new(format!("urgent paiement bloqué {}", i), Category::Urgency));
    }
    let dataset = Dataset::from_examples(examples, 20).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("classifier.bin");
    let result = train(&dataset, &TrainingConfig::default()).and_then(|(classifier, _)| {
        classifier.save(&artifact)?;
        Ok(classifier)
    });

    let err = result.unwrap_err();
    assert!(err.is_training_error());
    assert!(err.to_string().contains("Urgence"));
    assert!(!artifact.exists());
}

#[test]
fn test_single_example_class_cannot_be_split() {
    let mut examples: Vec<Example> = Category::ALL
        .iter()
        .flat_map(|c| (0..6).map(move |i| Example::new(format!("{} {}", c, i), *c)))
        .filter(|e| e.label != Category::Order)
        .collect();
    examples.push(Example::new("je commande", Category::Order));
    let dataset = Dataset::from_examples(examples, 1).unwrap();

    let err = Classifier::builder()
        .with_config(TrainingConfig {
            cv_folds: 2,
            ..TrainingConfig::default()
        })
        .with_dataset(dataset)
        .build()
        .unwrap_err();
    assert!(matches!(err, ClassifierError::InsufficientDataError(_)));
}

#[test]
fn test_settings_defaults() {
    let settings = Settings::default();
    assert_eq!(settings.text_column, "texte");
    assert_eq!(settings.label_column, "classe");
    assert_eq!(settings.training, TrainingConfig::default());
    assert!(settings.model_path.ends_with("classifier.bin"));
    assert!(settings.validate().is_ok());
}
