//! Everything between the token stream and the final instruction list:
//! semantic checks over the tokens, lowering to TAC and the TAC optimizer.

pub mod optimization;
pub mod semantic;
pub mod tac;
