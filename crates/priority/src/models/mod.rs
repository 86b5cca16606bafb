mod material;
mod score;

pub use self::material::{Material, MaterialId, NewMaterial, RevisionEntry};
pub use self::score::Score;

fn sanitize(s: impl AsRef<str>) -> String {
    s.as_ref().trim().to_lowercase().replace('-', "").replace('_', "").replace(' ', "")
}
