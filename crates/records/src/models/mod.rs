mod history;
mod material;

pub(crate) use self::history::RevisionEntryProxy;
pub(crate) use self::material::MaterialRow;
