/// Displays the human-facing part of a reply.
///
/// Rendering is a side effect only and must not fail: implementations
/// recover from their own output errors.
pub trait Render {
    fn render(&mut self, text: &str);
}

impl<R: Render + ?Sized> Render for Box<R> {
    #[inline]
    fn render(&mut self, text: &str) {
        (**self).render(text)
    }
}

impl<R: Render + ?Sized> Render for &mut R {
    #[inline]
    fn render(&mut self, text: &str) {
        (**self).render(text)
    }
}
