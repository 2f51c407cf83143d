use crate::compose::compose;
use crate::domain::comments::{Comment, PostMeta};
use crate::domain::harvest::HarvestResult;

const MOCK_COMMENT_COUNT: usize = 20;
const MOCK_TIMESTAMP: &str = "2024-01-01T00:00:00.000Z";
const MOCK_TEXTS: [&str; 3] = [
    "I want to win! @friend1 @friend2 #giveaway",
    "Participando! Gracias por el sorteo",
    "Me encanta este premio!!!",
];
const MOCK_CAPTION: &str = "SORTEO! 🎁 Para participar: 1) Seguir nuestra cuenta 2) Dar like 3) Comentar mencionando 2 amigos. Sorteo válido hasta el 30/09. #giveaway";
const MOCK_IMAGE_URL: &str = "https://placehold.co/600x600?text=Instagram+Post";

/// Fixed result for local development. Performs no I/O.
pub fn mock_result() -> HarvestResult {
    let comments = (1..=MOCK_COMMENT_COUNT)
        .map(|n| {
            let username = format!("mock_user_{n}");
            Comment {
                id: n.to_string(),
                avatar_url: Some(format!("https://unavatar.io/instagram/{username}?size=256")),
                username,
                text: MOCK_TEXTS[(n - 1) % MOCK_TEXTS.len()].to_string(),
                timestamp: MOCK_TIMESTAMP.to_string(),
            }
        })
        .collect();
    let post = PostMeta {
        caption: Some(MOCK_CAPTION.to_string()),
        image_url: Some(MOCK_IMAGE_URL.to_string()),
        ..PostMeta::default()
    };
    compose(comments, post)
}
