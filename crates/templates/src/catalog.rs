//! Fixed set of named templates.

pub const BRAND_NAME: &str = "AccuCoder";
pub const BRAND_TAGLINE: &str = "Medical Coding Platform";

/// Named HTML skeletons with `{{placeholder}}` substitution points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateName {
    Welcome,
    RoleChanged,
    PasswordReset,
    AccountDeleted,
    AdminNotification,
}

impl TemplateName {
    pub const ALL: [TemplateName; 5] = [
        TemplateName::Welcome,
        TemplateName::RoleChanged,
        TemplateName::PasswordReset,
        TemplateName::AccountDeleted,
        TemplateName::AdminNotification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateName::Welcome => "welcome",
            TemplateName::RoleChanged => "roleChanged",
            TemplateName::PasswordReset => "passwordReset",
            TemplateName::AccountDeleted => "accountDeleted",
            TemplateName::AdminNotification => "adminNotification",
        }
    }

    /// Exact lookup by name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }

    /// Lookup that never fails: unknown names fall back to `AdminNotification`.
    pub fn resolve(name: &str) -> Self {
        Self::parse(name).unwrap_or(TemplateName::AdminNotification)
    }

    pub fn skeleton(&self) -> &'static str {
        match self {
            TemplateName::Welcome => WELCOME,
            TemplateName::RoleChanged => ROLE_CHANGED,
            TemplateName::PasswordReset => PASSWORD_RESET,
            TemplateName::AccountDeleted => ACCOUNT_DELETED,
            TemplateName::AdminNotification => ADMIN_NOTIFICATION,
        }
    }
}

impl core::fmt::Display for TemplateName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

const WELCOME: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1 style="color: #2563eb;">Welcome to AccuCoder!</h1>
  <p>Hi {{firstName}},</p>
  <p>Thank you for joining AccuCoder. We're excited to have you on board!</p>
  <p>Your account has been successfully created. You can now access all our medical coding tools and resources.</p>
  <div style="margin: 30px 0;">
    <a href="{{loginUrl}}" style="background: #2563eb; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; display: inline-block;">
      Get Started
    </a>
  </div>
  <p>Best regards,<br>The AccuCoder Team</p>
</div>
"#;

const ROLE_CHANGED: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1 style="color: #2563eb;">Your Role Has Been Updated</h1>
  <p>Hi {{firstName}},</p>
  <p>Your role in AccuCoder has been updated to: <strong>{{newRole}}</strong></p>
  <p>This change was made by an administrator on {{date}}.</p>
  <p>If you have any questions about this change, please contact our support team.</p>
  <p>Best regards,<br>The AccuCoder Team</p>
</div>
"#;

const PASSWORD_RESET: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1 style="color: #2563eb;">Reset Your Password</h1>
  <p>Hi {{firstName}},</p>
  <p>We received a request to reset your password. Click the button below to create a new password:</p>
  <div style="margin: 30px 0;">
    <a href="{{resetUrl}}" style="background: #2563eb; color: white; padding: 12px 24px; text-decoration: none; border-radius: 6px; display: inline-block;">
      Reset Password
    </a>
  </div>
  <p>This link will expire in 1 hour.</p>
  <p>If you didn't request this, please ignore this email.</p>
  <p>Best regards,<br>The AccuCoder Team</p>
</div>
"#;

const ACCOUNT_DELETED: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1 style="color: #dc2626;">Account Deleted</h1>
  <p>Hi {{firstName}},</p>
  <p>Your AccuCoder account has been deleted by an administrator.</p>
  <p>If you believe this was done in error, please contact our support team immediately.</p>
  <p>Best regards,<br>The AccuCoder Team</p>
</div>
"#;

const ADMIN_NOTIFICATION: &str = r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h1 style="color: #2563eb;">Admin Notification</h1>
  <p>Hi {{firstName}},</p>
  <div style="background: #f3f4f6; padding: 20px; border-radius: 8px; margin: 20px 0;">
    {{message}}
  </div>
  <p>Best regards,<br>The AccuCoder Team</p>
</div>
"#;
