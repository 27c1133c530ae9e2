use std::path::PathBuf;

use crate::models::task::display_name;
use crate::services::naming_service::has_extension;
use crate::services::placement_service::copy_into;
use crate::state::AppState;

/// Copies documents into the watch folder, suffixing on name clashes.
/// Returns where each copy landed; failures are logged and skipped.
pub fn add_papers(state: &AppState, files: &[PathBuf]) -> Vec<PathBuf> {
    let mut added = Vec::new();
    for source in files {
        let name = display_name(source);
        if !has_extension(&name, state.extension()) {
            state
                .log
                .warn(format!("Ignoring '{name}': not a PDF file."));
            continue;
        }
        match copy_into(source, &state.config.watch_folder) {
            Ok(copied) => added.push(copied),
            Err(e) => state.log.error(format!("Failed to copy '{name}': {e}")),
        }
    }
    state.log.info(format!(
        "User added {} paper(s) to the ToSort folder.",
        added.len()
    ));
    added
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use crate::state::tests::scratch_state;

    #[test]
    fn copies_into_watch_folder_without_clobbering() {
        let (dir, state) = scratch_state();
        let outside = dir.path().join("Downloads");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("paper.pdf"), "new").unwrap();
        fs::write(outside.join("image.png"), "png").unwrap();
        fs::write(state.config.watch_folder.join("paper.pdf"), "waiting").unwrap();

        let added = add_papers(
            &state,
            &[
                outside.join("paper.pdf"),
                outside.join("image.png"),
                outside.join("gone.pdf"),
            ],
        );

        assert_eq!(added, vec![state.config.watch_folder.join("paper-1.pdf")]);
        assert_eq!(
            fs::read_to_string(state.config.watch_folder.join("paper.pdf")).unwrap(),
            "waiting"
        );
        assert!(outside.join("paper.pdf").exists());

        let log = state.log.read_to_string().unwrap();
        assert!(log.contains("Failed to copy 'gone.pdf'"));
        assert!(log.contains("User added 1 paper(s) to the ToSort folder."));
    }
}
