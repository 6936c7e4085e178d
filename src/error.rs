use thiserror::Error;

/// Reasons a packing request is rejected before any search runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackError {
    #[error("no pieces to cut")]
    NoPieces,

    #[error("stock length must be non-zero")]
    InvalidStockLength,

    #[error("piece #{} has zero length", .index + 1)]
    InvalidPieceLength { index: usize },

    /// A piece is longer than the stock it would be cut from.
    #[error("piece #{} ({}) is longer than stock length {}", .index + 1, .length, .stock_length)]
    Infeasible {
        index: usize,
        length: u32,
        stock_length: u32,
    },
}

pub type Result<T> = std::result::Result<T, PackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_use_one_based_piece_numbers() {
        let err = PackError::Infeasible {
            index: 0,
            length: 120,
            stock_length: 100,
        };
        assert_eq!(err.to_string(), "piece #1 (120) is longer than stock length 100");
        assert_eq!(
            PackError::InvalidPieceLength { index: 2 }.to_string(),
            "piece #3 has zero length"
        );
    }
}
