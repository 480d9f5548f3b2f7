use crate::types::Application;

const DEMO_APPLICATIONS: &str = include_str!("../data/demo_applications.json");

/// Sample applications used to seed the board when no backend fetch is configured.
pub fn demo_applications() -> Result<Vec<Application>, serde_json::Error> {
    serde_json::from_str(DEMO_APPLICATIONS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use crate::types::Stage;

    #[test]
    fn demo_set_fills_every_column() {
        let applications = demo_applications().expect("demo data parses");
        assert_eq!(applications.len(), 7);

        let board = Board::from_applications(applications);
        for stage in Stage::ALL {
            assert!(
                !board.column(stage).is_empty(),
                "{stage} should have at least one card"
            );
        }
        assert_eq!(board.column(Stage::Wishlist).len(), 2);
        assert_eq!(board.column(Stage::Applied).len(), 2);
        assert!(board.consistency_violations().is_empty());
    }
}
