use anyhow::{Context, Result};
use async_trait::async_trait;
use dico_types::{Word, WordId};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::store::StoreError;

/// Source of words for rounds.
#[async_trait]
pub trait WordCorpus: Send + Sync {
    /// Uniform pick among the words of `locale`, or among all words when no
    /// locale is given.
    async fn random_word(&self, locale: Option<&str>) -> Result<Option<Word>, StoreError>;

    async fn word_by_id(&self, word_id: WordId) -> Result<Option<Word>, StoreError>;
}

/// Word list held in memory, parsed from `locale<TAB>name<TAB>definition`
/// lines. Blank lines and lines starting with `#` are skipped.
pub struct InMemoryWordCorpus {
    words: Vec<Word>,
    index: HashMap<WordId, usize>,
}

impl InMemoryWordCorpus {
    /// Load a word list from a file
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read word list {}", path.display()))?;
        let corpus = Self::from_word_list(&content);
        info!("Loaded {} words from {}", corpus.len(), path.display());
        Ok(corpus)
    }

    pub fn from_word_list(word_list: &str) -> Self {
        let words = word_list
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(parse_line)
            .collect();
        Self::from_words(words)
    }

    pub fn from_words(words: Vec<Word>) -> Self {
        let index = words
            .iter()
            .enumerate()
            .map(|(position, word)| (word.id, position))
            .collect();
        Self { words, index }
    }

    /// Small bilingual list for tests and local runs
    pub fn new_with_test_words() -> Self {
        Self::from_word_list(
            "en\tapple\tThe round fruit of an apple tree.\n\
             en\tapple pie\tA pie filled with sliced apples.\n\
             en\tcat\tA small domesticated carnivorous mammal.\n\
             en\tforget-me-not\tA plant with small blue flowers.\n\
             fr\tchat\tPetit mammifère carnivore domestique.\n\
             fr\taujourd'hui\tAu jour où l'on est.",
        )
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Ids are derived from locale and name so they stay stable across restarts;
/// persisted rounds keep resolving after the list is reloaded.
pub fn stable_word_id(locale: &str, name: &str) -> WordId {
    WordId(Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("{}:{}", locale, name.to_lowercase()).as_bytes(),
    ))
}

fn parse_line(line: &str) -> Option<Word> {
    let mut parts = line.splitn(3, '\t');
    let locale = parts.next()?.trim().to_lowercase();
    let name = parts.next()?.trim().to_string();
    let definition = parts.next()?.trim().to_string();

    if locale.is_empty() || name.is_empty() || definition.is_empty() {
        return None;
    }

    Some(Word {
        id: stable_word_id(&locale, &name),
        name,
        definition,
        locale,
    })
}

#[async_trait]
impl WordCorpus for InMemoryWordCorpus {
    async fn random_word(&self, locale: Option<&str>) -> Result<Option<Word>, StoreError> {
        let candidates: Vec<&Word> = self
            .words
            .iter()
            .filter(|word| locale.is_none_or(|locale| word.locale == locale))
            .collect();

        Ok(candidates.choose(&mut rand::thread_rng()).map(|word| (*word).clone()))
    }

    async fn word_by_id(&self, word_id: WordId) -> Result<Option<Word>, StoreError> {
        Ok(self.index.get(&word_id).map(|&position| self.words[position].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_word_list() {
        let word_list = "# comment\n\nen\tapple\tA fruit.\nfr\tchat\tUn animal.\n\
                         broken line\nen\t\tno name";
        let corpus = InMemoryWordCorpus::from_word_list(word_list);

        assert_eq!(corpus.len(), 2);
        let locales: Vec<&str> = corpus.words.iter().map(|word| word.locale.as_str()).collect();
        assert_eq!(locales, vec!["en", "fr"]);
    }

    #[test]
    fn test_definition_may_contain_tabs() {
        let corpus = InMemoryWordCorpus::from_word_list("en\tapple\tA fruit.\tRound.");
        assert_eq!(corpus.words[0].definition, "A fruit.\tRound.");
    }

    #[test]
    fn test_word_ids_are_stable() {
        let first = InMemoryWordCorpus::new_with_test_words();
        let second = InMemoryWordCorpus::new_with_test_words();

        assert_eq!(first.words[0].id, second.words[0].id);
        assert_eq!(stable_word_id("en", "Apple"), stable_word_id("en", "apple"));
        assert_ne!(stable_word_id("en", "chat"), stable_word_id("fr", "chat"));
    }

    #[tokio::test]
    async fn test_random_word_respects_locale() {
        let corpus = InMemoryWordCorpus::new_with_test_words();

        for _ in 0..20 {
            let word = corpus.random_word(Some("fr")).await.unwrap().unwrap();
            assert_eq!(word.locale, "fr");
        }
        assert!(corpus.random_word(Some("de")).await.unwrap().is_none());
        assert!(corpus.random_word(None).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_word_by_id() {
        let corpus = InMemoryWordCorpus::new_with_test_words();
        let id = stable_word_id("en", "cat");

        let word = corpus.word_by_id(id).await.unwrap().unwrap();
        assert_eq!(word.name, "cat");
        assert!(corpus.word_by_id(WordId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_corpus() {
        let corpus = InMemoryWordCorpus::from_word_list("");
        assert!(corpus.is_empty());
        assert!(corpus.random_word(None).await.unwrap().is_none());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = InMemoryWordCorpus::new("/definitely/not/here.tsv");
        assert!(result.is_err());
        assert!(result.err().unwrap().to_string().contains("Failed to read word list"));
    }
}
