use ragchat::application::ports::TextSplitter;
use ragchat::domain::SourceDocument;
use ragchat::infrastructure::text_processing::RecursiveCharacterSplitter;

const SMALL_CHUNK_SIZE: usize = 40;
const SMALL_OVERLAP: usize = 8;

fn document(text: &str) -> SourceDocument {
    SourceDocument::new("notes.md", text)
}

#[tokio::test]
async fn given_text_when_recursive_character_splitter_splits_then_chunks_respect_size() {
    let splitter = RecursiveCharacterSplitter::new(SMALL_CHUNK_SIZE, SMALL_OVERLAP).unwrap();
    let text = "This is a test document with some content. It keeps going for a while \
                so that several windows are needed to cover all of it.";

    let chunks = splitter.split(&document(text)).await.unwrap();

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.text.chars().count() <= SMALL_CHUNK_SIZE);
        assert_eq!(chunk.source, "notes.md");
    }
}

#[tokio::test]
async fn given_empty_text_when_recursive_character_splitter_splits_then_returns_empty_chunks() {
    let splitter = RecursiveCharacterSplitter::new(SMALL_CHUNK_SIZE, SMALL_OVERLAP).unwrap();

    let chunks = splitter.split(&document("")).await.unwrap();

    assert!(chunks.is_empty());
}

#[tokio::test]
async fn given_whitespace_only_text_when_splitting_then_no_chunk_is_produced() {
    let splitter = RecursiveCharacterSplitter::new(SMALL_CHUNK_SIZE, SMALL_OVERLAP).unwrap();

    let chunks = splitter.split(&document("   \n\n  \t ")).await.unwrap();

    assert!(chunks.is_empty());
}

#[tokio::test]
async fn given_short_text_when_splitting_then_single_chunk_at_offset_zero() {
    let splitter = RecursiveCharacterSplitter::new(SMALL_CHUNK_SIZE, SMALL_OVERLAP).unwrap();

    let chunks = splitter.split(&document("Short note.")).await.unwrap();

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Short note.");
    assert_eq!(chunks[0].offset, 0);
}

#[tokio::test]
async fn given_chunks_when_reassembled_by_offset_then_every_character_is_covered() {
    let splitter = RecursiveCharacterSplitter::new(SMALL_CHUNK_SIZE, SMALL_OVERLAP).unwrap();
    let text = "Första stycket handlar om returer.\n\nAndra stycket om frakt och leveranstider, \
                som brukar vara fem dagar. Tredje stycket är kort.";
    let chars: Vec<char> = text.chars().collect();

    let chunks = splitter.split(&document(text)).await.unwrap();

    let mut covered = 0;
    for chunk in &chunks {
        let expected: String = chars[chunk.offset..chunk.offset + chunk.text.chars().count()]
            .iter()
            .collect();
        assert_eq!(chunk.text, expected);
        assert!(chunk.offset <= covered, "gap before offset {}", chunk.offset);
        covered = chunk.offset + chunk.text.chars().count();
    }
    assert_eq!(covered, chars.len());
}

#[tokio::test]
async fn given_paragraph_break_in_window_when_splitting_then_chunk_ends_on_it() {
    let splitter = RecursiveCharacterSplitter::new(SMALL_CHUNK_SIZE, SMALL_OVERLAP).unwrap();
    let text = "A first paragraph of text.\n\nThen a second paragraph follows here.";

    let chunks = splitter.split(&document(text)).await.unwrap();

    assert_eq!(chunks[0].text, "A first paragraph of text.\n\n");
}

#[tokio::test]
async fn given_same_document_when_split_twice_then_chunk_ids_are_stable() {
    let splitter = RecursiveCharacterSplitter::new(SMALL_CHUNK_SIZE, SMALL_OVERLAP).unwrap();
    let text = "Stable ids come from source, version and position in the document.";

    let first = splitter.split(&document(text)).await.unwrap();
    let second = splitter.split(&document(text)).await.unwrap();
    let changed = splitter.split(&document(&format!("{text} Edited."))).await.unwrap();

    let ids = |chunks: &[ragchat::domain::Chunk]| chunks.iter().map(|c| c.id).collect::<Vec<_>>();
    assert_eq!(ids(&first), ids(&second));
    assert_ne!(first[0].id, changed[0].id);
}

#[test]
fn given_overlap_not_smaller_than_size_when_building_splitter_then_rejected() {
    assert!(RecursiveCharacterSplitter::new(10, 10).is_err());
    assert!(RecursiveCharacterSplitter::new(0, 0).is_err());
    assert!(RecursiveCharacterSplitter::new(10, 9).is_ok());
}
