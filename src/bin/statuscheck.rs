use cleftcare::seed::SeedData;
use cleftcare::status::StatusNormalizer;

/// Print how every raw status token in a seed file normalizes.
/// Exits non-zero when a token fell back to the default.
fn main() -> anyhow::Result<()> {
    let seed = match std::env::args().nth(1) {
        Some(path) => SeedData::from_path(&path)?,
        None => SeedData::builtin()?,
    };

    let normalizer = StatusNormalizer::default();
    let mut unmatched = 0;
    for (collection, token) in seed.status_tokens() {
        let n = normalizer.normalize(token);
        let flag = if n.matched { "" } else { "  <- default" };
        if !n.matched {
            unmatched += 1;
        }
        println!("{collection:?}\t{:?}\t{}{flag}", token.unwrap_or_default(), n.status);
    }

    if unmatched > 0 {
        anyhow::bail!("{unmatched} status token(s) not recognised");
    }
    Ok(())
}
