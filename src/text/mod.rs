/// Text normalization for crime-report descriptions
///
/// Turns free text into the token string the feature extractor consumes:
/// - URL, email and phone-number stripping
/// - Tokenization and stopword removal
/// - Noun lemmatization
/// - Optional bigram/trigram augmentation

pub mod lemmatizer;
pub mod normalizer;
pub mod stopwords;

pub use lemmatizer::Lemmatizer;
pub use normalizer::TextNormalizer;
pub use stopwords::{StopwordSet, DOMAIN_STOPWORDS, ENGLISH_STOPWORDS};
