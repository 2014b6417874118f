use testcontainers::core::ContainerPort;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

use ragchat::application::ports::VectorStore;
use ragchat::domain::{Chunk, Embedding};
use ragchat::infrastructure::persistence::QdrantAdapter;

const DIMENSION: usize = 4;

struct TestQdrant {
    adapter: QdrantAdapter,
    _container: ContainerAsync<GenericImage>,
}

impl TestQdrant {
    async fn new() -> Self {
        let container = GenericImage::new("qdrant/qdrant", "latest")
            .with_exposed_port(ContainerPort::Tcp(6334))
            .start()
            .await
            .expect("Failed to start Qdrant container");

        let host_port = container
            .get_host_port_ipv4(6334)
            .await
            .expect("Failed to get Qdrant gRPC port");
        let url = format!("http://localhost:{}", host_port);
        let collection_name = format!("test_collection_{}", uuid::Uuid::new_v4());

        tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

        let adapter = QdrantAdapter::new(&url, collection_name)
            .await
            .expect("Failed to create QdrantAdapter");
        adapter
            .ensure_collection(DIMENSION)
            .await
            .expect("Failed to create collection");

        Self {
            adapter,
            _container: container,
        }
    }
}

fn chunks(source: &str, version: &str, texts: &[&str]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| Chunk::new(text.to_string(), source.to_string(), version.to_string(), i, i * 10))
        .collect()
}

fn axis(i: usize) -> Embedding {
    let mut values = vec![0.0; DIMENSION];
    values[i] = 1.0;
    Embedding::new(values)
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_stored_source_when_searching_then_nearest_chunk_comes_first() {
    let qdrant = TestQdrant::new().await;
    let stored = chunks("policy.md", "v1", &["returns", "refunds"]);

    qdrant
        .adapter
        .replace_source("policy.md", &stored, &[axis(0), axis(1)])
        .await
        .unwrap();
    let results = qdrant.adapter.search(&axis(1), 2).await.unwrap();

    assert_eq!(results[0].chunk.text, "refunds");
    assert_eq!(results[0].chunk.source, "policy.md");
    assert_eq!(qdrant.adapter.count().await.unwrap(), 2);
    assert_eq!(
        qdrant.adapter.source_version("policy.md").await.unwrap(),
        Some("v1".to_string())
    );
}

#[tokio::test]
#[ignore = "requires docker"]
async fn given_new_version_when_replacing_source_then_old_chunks_are_gone() {
    let qdrant = TestQdrant::new().await;
    qdrant
        .adapter
        .replace_source("policy.md", &chunks("policy.md", "v1", &["a", "b"]), &[axis(0), axis(1)])
        .await
        .unwrap();

    qdrant
        .adapter
        .replace_source("policy.md", &chunks("policy.md", "v2", &["c"]), &[axis(2)])
        .await
        .unwrap();

    assert_eq!(qdrant.adapter.count().await.unwrap(), 1);
    assert_eq!(
        qdrant.adapter.source_version("policy.md").await.unwrap(),
        Some("v2".to_string())
    );
    assert_eq!(qdrant.adapter.source_version("other.md").await.unwrap(), None);
}
