pub(crate) use {
    std::{
        collections::{
            BTreeMap,
            HashMap,
        },
        fmt,
        io,
        iter,
        path::{
            Path,
            PathBuf,
        },
        str::FromStr,
        sync::Arc,
        time::Duration,
    },
    async_trait::async_trait,
    itertools::Itertools as _,
    lazy_regex::regex_captures,
    serde::{
        Deserialize,
        Serialize,
    },
};
