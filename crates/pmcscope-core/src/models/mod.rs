mod article;

pub use article::{
    ArticleRecord, SectionKind, NO_ABSTRACT, NO_AUTHORS, UNKNOWN_DATE, UNKNOWN_PUBLISHER,
    UNKNOWN_TITLE,
};
