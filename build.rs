use vergen_gitcl::{Emitter, Gitcl};

// Only the git metadata is read back (see src/version.rs).
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let gitcl = Gitcl::builder().branch(true).sha(true).dirty(true).build();
    Emitter::default().add_instructions(&gitcl)?.emit()?;
    Ok(())
}
