//! End-to-end: CSV corpus -> indexer -> bundle on disk -> loaded index -> recommendations.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use recipe_recommender::{
    ingestion::CorpusIndexer,
    provider::CsvRecipeProvider,
    query::{LoadedIndex, QueryError, Recommender},
    storage::{DirectoryStorage, LoadError, NEIGHBORS_FILE},
};

const CORPUS: &str = "\
recipe_id,recipe_name,aver_rate,image_url,review_nums,ingredients_list,calories,fat,carbohydrates,protein,cholesterol,sodium,fiber
1,Flatbread,4.2,http://img/1.jpg,10,\"['egg', 'flour']\",180,4,30,6,40,200,1
2,Custard,4.7,http://img/2.jpg,25,\"['egg', 'milk', 'sugar']\",250,9,35,7,120,90,0
3,Chicken Rice,3.8,http://img/3.jpg,4,\"['chicken', 'rice']\",520,14,60,35,90,700,2
";

fn query(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

async fn build_bundle_at(bundle: &Path) {
    let mut corpus = tempfile::NamedTempFile::new().unwrap();
    corpus.write_all(CORPUS.as_bytes()).unwrap();

    let provider = CsvRecipeProvider::from_file(corpus.path()).await.unwrap();
    let stats = CorpusIndexer::new(DirectoryStorage::new(bundle))
        .build(&provider)
        .await
        .unwrap();

    assert_eq!(stats.rows_indexed, 3);
    assert_eq!(stats.empty_ingredients, 0);
    assert_eq!(stats.duplicate_ids, 0);
}

#[tokio::test]
async fn test_recommend_from_built_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("recipe_index");
    build_bundle_at(&bundle).await;

    let index = LoadedIndex::load(&bundle).await.unwrap();
    assert_eq!(index.len(), 3);

    let results = index.recommend(&query(&["egg", "flour"]), 2).unwrap();
    let ids: Vec<i64> = results.iter().map(|r| r.recipe.id).collect();
    assert_eq!(ids, vec![1, 2]);

    let best = &results[0];
    assert_eq!(best.recipe.name, "Flatbread");
    let expected: BTreeSet<String> = query(&["egg", "flour"]).into_iter().collect();
    assert_eq!(best.available, expected);
    assert!(best.missing.is_empty());
    assert!((best.similarity - 1.0).abs() < 1e-9);

    let second = &results[1];
    assert!(second.available.contains("egg"));
    assert!(second.missing.contains("milk"));
    assert!(second.missing.contains("sugar"));
    assert!(second.similarity < best.similarity);
}

#[tokio::test]
async fn test_large_k_and_invalid_query() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("recipe_index");
    build_bundle_at(&bundle).await;

    let index = LoadedIndex::load(&bundle).await.unwrap();

    let all = index.recommend(&query(&["Egg", "FLOUR"]), 10).unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].recipe.id, 1);
    assert_eq!(all[2].recipe.id, 3);
    assert_eq!(all[2].similarity, 0.0);

    assert!(matches!(
        index.recommend(&[], 5),
        Err(QueryError::InvalidQuery(_))
    ));
    assert!(matches!(
        index.recommend(&query(&["  ", ""]), 5),
        Err(QueryError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn test_load_detects_truncated_neighbor_index() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = dir.path().join("recipe_index");
    build_bundle_at(&bundle).await;

    let path = bundle.join(NEIGHBORS_FILE);
    let mut value: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    value["payload"]["rows"].as_array_mut().unwrap().truncate(2);
    std::fs::write(&path, serde_json::to_vec(&value).unwrap()).unwrap();

    let err = LoadedIndex::load(&bundle).await.unwrap_err();
    assert!(
        matches!(
            err,
            LoadError::RowCountMismatch {
                index_rows: 2,
                recipes: 3
            }
        ),
        "unexpected error: {}",
        err
    );
}
