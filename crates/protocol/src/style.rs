/// Render a line of text in the gateway's neon house style, tagged with the
/// channel and the session/correlation it belongs to (`-` when unknown).
pub fn stylize(text: &str, channel: &str, session_id: Option<&str>, corr_id: Option<&str>) -> String {
    let sid = session_id.unwrap_or("-");
    let cid = corr_id.unwrap_or("-");
    format!("[NEON][{channel}][sid:{sid}][cid:{cid}] {text}")
}
